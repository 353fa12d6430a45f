use std::collections::BTreeSet;

use hashed_btree_index::{BtreeConfig, BtreeIndex};
use proptest::prelude::*;

fn entries() -> impl Strategy<Value = Vec<(i64, u16)>> {
    // A small key range produces many collisions
    prop::collection::vec((-30i64..30, 0u16..64), 0..400)
}

proptest! {
    #[test]
    fn behaves_like_ordered_set(b in 2usize..=20, input in entries()) {
        let mut oracle = BTreeSet::new();
        let mut t = BtreeIndex::new(b).unwrap();

        for (key, value) in &input {
            let newly_inserted = t.insert(*key, *value).unwrap();
            prop_assert_eq!(oracle.insert((*key, *value)), newly_inserted);
        }

        prop_assert_eq!(oracle.len(), t.len());
        for (key, value) in &oracle {
            prop_assert!(t.contains(*key, value));
        }
        prop_assert!(!t.contains(30, &0));
        prop_assert!(!t.contains(0, &64));

        let expected: Vec<u16> = oracle.iter().map(|(_, v)| *v).collect();
        let actual: Vec<u16> = t.iter().collect();
        prop_assert_eq!(expected, actual);
    }

    #[test]
    fn leaf_level_is_sorted_and_bounded(b in 2usize..=12, input in entries()) {
        let mut t = BtreeIndex::new(b).unwrap();
        for (key, value) in input {
            t.insert(key, value).unwrap();
        }

        let levels = t.node_keys_by_level();
        prop_assert_eq!(levels.len(), t.height());
        prop_assert_eq!(1, levels[0].len());

        let leaf_keys = levels[levels.len() - 1].concat();
        prop_assert!(leaf_keys.windows(2).all(|w| w[0] < w[1]));
        for level in &levels[1..] {
            for node in level {
                prop_assert!(node.len() <= b);
            }
        }
    }

    #[test]
    fn equal_regardless_of_order_and_branching_factor(
        b1 in 2usize..=16,
        b2 in 2usize..=16,
        input in entries(),
    ) {
        let mut reversed = input.clone();
        reversed.reverse();

        let t1 = BtreeIndex::bulk_load(BtreeConfig::default().branching_factor(b1), input.clone()).unwrap();
        let t2 = BtreeIndex::bulk_load(BtreeConfig::default().branching_factor(b2), reversed).unwrap();
        prop_assert_eq!(&t1, &t2);

        let mut t3 = BtreeIndex::bulk_load(BtreeConfig::default().branching_factor(b2), input).unwrap();
        t3.insert(1000, 0).unwrap();
        prop_assert_ne!(&t1, &t3);
    }

    #[test]
    fn inserting_twice_does_not_change_size(input in entries()) {
        let mut t = BtreeIndex::new(3).unwrap();
        for (key, value) in &input {
            t.insert(*key, *value).unwrap();
        }
        let len = t.len();
        for (key, value) in &input {
            prop_assert!(!t.insert(*key, *value).unwrap());
        }
        prop_assert_eq!(len, t.len());
    }
}
