#![no_main]
use fake::{Fake, StringFaker};
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use hashed_btree_index::BtreeIndex;

fuzz_target!(|seed: u64| {
    // Create an index with random entries, keyed by the string length to force collisions
    let n_entries = 2000;
    let mut rng = rand::rngs::SmallRng::seed_from_u64(seed);
    const ASCII: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let id_faker = StringFaker::with(Vec::from(ASCII), 8..16);

    let mut btree: BtreeIndex<String> = BtreeIndex::new(16).unwrap();

    // Insert the strings
    for _ in 0..n_entries {
        let value: String = id_faker.fake_with_rng(&mut rng);
        btree.insert(value.len() as i64, value).unwrap();
    }
    // Generate and insert a known value
    let search_value: String = id_faker.fake_with_rng(&mut rng);
    let search_key = search_value.len() as i64;

    btree.insert(search_key, search_value.clone()).unwrap();

    assert!(btree.contains(search_key, &search_value));
});
