//! End-to-end scenario for the Counting Bloom filter (S6): 300 distinct
//! inserts must never false-negative, and the false-positive rate against
//! 10,000 fresh keys must stay within the filter's configured budget.

use sketch_oxide::common::{BloomFilter, FlowKey};
use sketch_oxide::membership::CountingBloomFilter;

fn key(i: u32) -> FlowKey<4> {
    FlowKey::from_bytes(i.to_le_bytes())
}

#[test]
fn zero_false_negatives_and_bounded_false_positive_rate() {
    let mut filter = CountingBloomFilter::<4>::new(1000, 7).unwrap();

    let inserted: Vec<FlowKey<4>> = (0u32..300).map(key).collect();
    for k in &inserted {
        filter.insert(k);
    }
    for k in &inserted {
        assert!(filter.lookup(k), "false negative for an inserted key");
    }

    let fresh_start = 1_000_000u32;
    let trials = 10_000u32;
    let false_positives = (0..trials).filter(|&i| filter.lookup(&key(fresh_start + i))).count();
    let rate = false_positives as f64 / trials as f64;
    assert!(rate <= 0.05, "false-positive rate {rate} exceeded the 5% budget");
}

#[test]
fn insert_remove_round_trip_on_many_keys() {
    let mut filter = CountingBloomFilter::<4>::new(500, 5).unwrap();
    let keys: Vec<FlowKey<4>> = (0u32..100).map(key).collect();

    for k in &keys {
        filter.insert(k);
    }
    for k in keys.iter().step_by(2) {
        filter.remove(k);
    }
    for (i, k) in keys.iter().enumerate() {
        if i % 2 == 0 {
            assert!(!filter.lookup(k), "key {i} should have been removed");
        } else {
            assert!(filter.lookup(k), "key {i} should still be present");
        }
    }
}
