//! In-memory B+ tree index for values identified by a 64 bit hash.
//!
//! Since a hash is not a unique identifier, several values can share the same key.
//! The index keeps such values in a sorted collision group, so membership tests always
//! compare the actual values and not only their keys.
//!
//! [`BtreeIndex`] expects the caller to compute the key for each value, while
//! [`HashedSet`] wraps the index and computes the keys with a [`std::hash::BuildHasher`].

mod btree;
mod error;
mod set;

pub use btree::{BtreeIndex, IntoIter, Snapshot};
pub use error::{Error, Result};
pub use set::{DefaultHashBuilder, HashedSet};

pub const MIN_BRANCHING_FACTOR: usize = 2;
pub const MAX_BRANCHING_FACTOR: usize = 255;

/// Configuration for a B+ tree index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BtreeConfig {
    branching_factor: usize,
}

impl Default for BtreeConfig {
    fn default() -> Self {
        Self {
            branching_factor: 16,
        }
    }
}

impl BtreeConfig {
    /// Set the maximum number of keys per leaf and children per branch.
    ///
    /// Must be in the range `2..=255`, which is checked when the index is created.
    pub fn branching_factor(mut self, branching_factor: usize) -> Self {
        self.branching_factor = branching_factor;
        self
    }

    pub(crate) fn validate(&self) -> Result<usize> {
        if (MIN_BRANCHING_FACTOR..=MAX_BRANCHING_FACTOR).contains(&self.branching_factor) {
            Ok(self.branching_factor)
        } else {
            Err(Error::BranchingFactorOutOfRange(self.branching_factor))
        }
    }
}
