#![no_main]
use libfuzzer_sys::fuzz_target;

use hashed_btree_index::BtreeIndex;
use std::collections::BTreeSet;

fuzz_target!(|data: (Vec<(i64, u32)>, u8)| {
    let b = data.1.max(2) as usize;
    let mut m = BTreeSet::default();
    let mut fixture = BtreeIndex::new(b).unwrap();

    for (key, value) in data.0 {
        assert_eq!(m.insert((key, value)), fixture.insert(key, value).unwrap());
    }

    // Check len() function
    assert_eq!(m.len(), fixture.len());

    // contains query for each entry
    for (k, v) in m.iter() {
        assert!(fixture.contains(*k, v));
    }

    // Check that both contain the same values in the same order
    let m: Vec<_> = m.into_iter().map(|(_, v)| v).collect();
    let fixture_result: Vec<_> = fixture.iter().collect();

    assert_eq!(m, fixture_result);
});
