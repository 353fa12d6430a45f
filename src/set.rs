use std::{
    fmt::Debug,
    hash::{BuildHasher, BuildHasherDefault, Hash},
};

use rustc_hash::FxHasher;

use crate::{btree::Snapshot, error::Result, BtreeConfig, BtreeIndex};

/// Deterministic hasher, so sets with the same values have the same keys.
pub type DefaultHashBuilder = BuildHasherDefault<FxHasher>;

/// Set of values backed by a [`BtreeIndex`], using the hash of each value as key.
///
/// Values with the same hash are stored next to each other in a collision group.
/// This means values need to be orderable with [`PartialOrd`] whenever their hashes collide.
///
/// Iterating over the set returns the values ordered by their hash.
pub struct HashedSet<V, S = DefaultHashBuilder> {
    index: BtreeIndex<V>,
    hash_builder: S,
}

impl<V> HashedSet<V, DefaultHashBuilder> {
    /// Create an empty set using the default branching factor of 16.
    pub fn new() -> HashedSet<V, DefaultHashBuilder> {
        HashedSet {
            index: BtreeIndex::with_config(BtreeConfig::default())
                .unwrap_or_else(|_| unreachable!("default configuration is valid")),
            hash_builder: DefaultHashBuilder::default(),
        }
    }

    pub fn with_branching_factor(branching_factor: usize) -> Result<HashedSet<V, DefaultHashBuilder>> {
        HashedSet::with_hasher(branching_factor, DefaultHashBuilder::default())
    }
}

impl<V> Default for HashedSet<V, DefaultHashBuilder> {
    fn default() -> Self {
        HashedSet::new()
    }
}

impl<V, S> HashedSet<V, S> {
    pub fn with_hasher(branching_factor: usize, hash_builder: S) -> Result<HashedSet<V, S>> {
        Ok(HashedSet {
            index: BtreeIndex::new(branching_factor)?,
            hash_builder,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn branching_factor(&self) -> usize {
        self.index.branching_factor()
    }

    /// Read access to the underlying index.
    pub fn as_index(&self) -> &BtreeIndex<V> {
        &self.index
    }
}

impl<V, S> HashedSet<V, S>
where
    V: Hash,
    S: BuildHasher,
{
    fn key_of(&self, value: &V) -> i64 {
        // Only the bit pattern matters, so wrapping into the negative range is fine
        self.hash_builder.hash_one(value) as i64
    }

    /// Returns whether the set contains a value equal to the given one.
    pub fn contains(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.index.contains(self.key_of(value), value)
    }

    /// Adds a value to the set and returns whether it was newly inserted.
    pub fn insert(&mut self, value: V) -> Result<bool>
    where
        V: PartialOrd,
    {
        let key = self.key_of(&value);
        self.index.insert(key, value)
    }
}

impl<V> HashedSet<V, DefaultHashBuilder>
where
    V: Hash + PartialOrd,
{
    /// Create a set with the given branching factor and add all values.
    ///
    /// If a value can't be added, the partially filled set is discarded and the error returned.
    pub fn from_values<I>(values: I, branching_factor: usize) -> Result<HashedSet<V, DefaultHashBuilder>>
    where
        I: IntoIterator<Item = V>,
    {
        let hash_builder = DefaultHashBuilder::default();
        let config = BtreeConfig::default().branching_factor(branching_factor);
        let entries = values.into_iter().map(|value| {
            let key = hash_builder.hash_one(&value) as i64;
            (key, value)
        });
        let index = BtreeIndex::bulk_load(config, entries)?;
        Ok(HashedSet {
            index,
            hash_builder,
        })
    }
}

impl<V, S> HashedSet<V, S>
where
    V: Clone,
{
    /// Returns an iterator over a snapshot of the values, ordered by their hash.
    pub fn iter(&self) -> Snapshot<V> {
        self.index.iter()
    }
}

impl<V, S> IntoIterator for HashedSet<V, S> {
    type Item = V;
    type IntoIter = crate::IntoIter<V>;

    fn into_iter(self) -> Self::IntoIter {
        self.index.into_iter()
    }
}

impl<V, S> PartialEq for HashedSet<V, S>
where
    V: PartialEq,
{
    /// Sets are only comparable when both use hashers producing the same hash for equal values.
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<V, S> Debug for HashedSet<V, S>
where
    V: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.index.values()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::hash::Hasher;

    use super::*;
    use crate::Error;

    /// Hashes all integers into only four different keys to force collisions.
    #[derive(Clone, Default)]
    struct ModuloFour;

    struct ModuloFourHasher(u64);

    impl Hasher for ModuloFourHasher {
        fn finish(&self) -> u64 {
            self.0 % 4
        }

        fn write(&mut self, bytes: &[u8]) {
            for b in bytes {
                self.0 = self.0.wrapping_add(*b as u64);
            }
        }

        fn write_u64(&mut self, i: u64) {
            self.0 = self.0.wrapping_add(i);
        }
    }

    impl BuildHasher for ModuloFour {
        type Hasher = ModuloFourHasher;

        fn build_hasher(&self) -> ModuloFourHasher {
            ModuloFourHasher(0)
        }
    }

    #[test]
    fn empty_set() {
        let s: HashedSet<String> = HashedSet::new();
        assert_eq!(0, s.len());
        assert!(s.is_empty());
        assert_eq!(16, s.branching_factor());
        assert!(!s.contains(&"foo".to_string()));
    }

    #[test]
    fn invalid_branching_factor() {
        for b in [0, 1, 256, 1000] {
            let result = HashedSet::<u64>::with_branching_factor(b);
            assert!(matches!(result, Err(Error::BranchingFactorOutOfRange(f)) if f == b));
        }
        assert!(HashedSet::<u64>::from_values(vec![1, 2, 3], 1).is_err());
    }

    #[test]
    fn insert_and_contains() {
        for b in [2, 8, 32, 128] {
            let mut s = HashedSet::with_branching_factor(b).unwrap();
            for i in 0..1000u64 {
                assert!(s.insert(i).unwrap());
            }
            assert_eq!(1000, s.len());
            for i in 0..1000u64 {
                assert!(s.contains(&i));
                assert!(!s.insert(i).unwrap());
            }
            assert!(!s.contains(&1000));
            assert_eq!(1000, s.len());
        }
    }

    #[test]
    fn collisions_are_resolved_by_value() {
        let mut s = HashedSet::with_hasher(2, ModuloFour).unwrap();
        for i in 0..50u64 {
            assert!(s.insert(i).unwrap());
        }
        assert_eq!(50, s.len());
        for i in 0..50u64 {
            assert!(s.contains(&i));
        }
        assert!(!s.contains(&50));
        assert!(!s.contains(&1234));

        // All values of a key are returned in their order, keys in ascending order
        let values: Vec<u64> = s.iter().collect();
        let mut expected: Vec<u64> = (0..50).collect();
        expected.sort_by_key(|v| (v % 4, *v));
        assert_eq!(expected, values);
        let levels = s.as_index().node_keys_by_level();
        assert_eq!(vec![0, 1, 2, 3], levels[levels.len() - 1].concat());
    }

    #[test]
    fn collision_then_add() {
        let mut s = HashedSet::from_values(vec![3u64, 7], 2).unwrap();
        assert_eq!(2, s.len());

        let mut s2 = HashedSet::with_hasher(2, ModuloFour).unwrap();
        s2.insert(3u64).unwrap();
        s2.insert(7u64).unwrap();
        assert!(s2.contains(&3));
        assert!(s2.contains(&7));
        assert!(!s2.contains(&4));
        assert_eq!(2, s2.len());

        s2.insert(4).unwrap();
        s.insert(4).unwrap();
        assert!(s2.contains(&4));
        assert_eq!(3, s2.len());
        assert_eq!(3, s.len());
    }

    #[test]
    fn equal_sets_with_different_branching_factors() {
        let values: Vec<String> = (0..128).map(|i| format!("value {}", i)).collect();
        for b1 in [2, 8, 32, 128] {
            for b2 in [2, 8, 32, 128] {
                let s1 = HashedSet::from_values(values.clone(), b1).unwrap();
                let mut reversed = values.clone();
                reversed.reverse();
                let s2 = HashedSet::from_values(reversed, b2).unwrap();
                assert_eq!(s1, s2);

                let mut s3 = HashedSet::from_values(values.clone(), b2).unwrap();
                s3.insert("one more".to_string()).unwrap();
                assert_ne!(s1, s3);
            }
        }
        let e1: HashedSet<String> = HashedSet::with_branching_factor(2).unwrap();
        let e2: HashedSet<String> = HashedSet::with_branching_factor(128).unwrap();
        assert_eq!(e1, e2);
    }

    #[test]
    fn incomparable_collision_is_reported() {
        #[derive(Debug, PartialEq, PartialOrd)]
        struct Measurement(f64);

        impl Hash for Measurement {
            fn hash<H: Hasher>(&self, state: &mut H) {
                state.write_u64(0);
            }
        }

        // All values have the same hash, but NaN can't be ordered
        let mut s = HashedSet::with_hasher(4, ModuloFour).unwrap();
        assert!(s.insert(Measurement(1.0)).unwrap());
        let result = s.insert(Measurement(f64::NAN));
        assert!(matches!(result, Err(Error::IncomparableValues { key: 0 })));
        assert_eq!(1, s.len());
        assert!(s.contains(&Measurement(1.0)));

        assert!(s.insert(Measurement(-1.0)).unwrap());
        assert_eq!(2, s.len());
    }

    #[test]
    fn into_iter_returns_owned_values() {
        let s = HashedSet::from_values((0..100).map(|i| i.to_string()), 4).unwrap();
        let mut values: Vec<String> = s.into_iter().collect();
        values.sort();
        let mut expected: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        expected.sort();
        assert_eq!(expected, values);
    }

    #[test]
    fn debug_output() {
        let s = HashedSet::with_hasher(4, ModuloFour).and_then(|mut s| {
            s.insert(2u64)?;
            s.insert(1u64)?;
            Ok(s)
        });
        assert_eq!("{1, 2}", format!("{:?}", s.unwrap()));
    }
}
