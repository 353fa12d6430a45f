#![no_main]
use libfuzzer_sys::fuzz_target;

use hashed_btree_index::HashedSet;
use std::collections::HashSet;

fuzz_target!(|data: (Vec<String>, u8)| {
    let b = data.1.max(2) as usize;
    let mut m = HashSet::new();
    let mut fixture = HashedSet::with_branching_factor(b).unwrap();

    for value in data.0 {
        m.insert(value.clone());
        fixture.insert(value).unwrap();
    }

    assert_eq!(m.len(), fixture.len());
    for v in m.iter() {
        assert!(fixture.contains(v));
    }
});
