use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("branching factor {0} is out of bounds, needs to be in [2, 255]")]
    BranchingFactorOutOfRange(usize),
    #[error("values colliding at key {key} can not be ordered")]
    IncomparableValues { key: i64 },
    #[error("could not compute key for value")]
    Hash(#[source] Box<dyn std::error::Error + Send + Sync>),
}
