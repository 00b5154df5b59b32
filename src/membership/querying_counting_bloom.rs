//! Querying counting Bloom filter: the same shared-cell addressing as
//! [`super::counting_bloom::CountingBloomFilter`], but exposing a
//! frequency estimate rather than a boolean membership test.

use crate::ch::CounterHierarchy;
use crate::common::hash::hash_flowkey;
use crate::common::validation::validate_bloom_parameters;
use crate::common::{ChConfig, CountingSketch, FlowKey, Result};

/// `update(key, val)` adds `val` to every one of a key's `nhash` cells;
/// `query(key)` returns the minimum across them, a count-min-style read
/// over storage shared by every key rather than a per-key grid.
pub struct QueryingCountingBloomFilter<const K: usize> {
    num_hash: u16,
    num_cells: u64,
    ch: CounterHierarchy,
}

impl<const K: usize> QueryingCountingBloomFilter<K> {
    /// Builds a filter addressing `num_cells` shared cells via `num_hash`
    /// independent hashes, with an optional compensation sketch of shape
    /// `cm_r x cm_w` (pass `(0, 0)` to disable it).
    pub fn new(num_cells: usize, num_hash: usize, cm_r: u32, cm_w: u32) -> Result<Self> {
        validate_bloom_parameters(num_cells, num_hash)?;
        let config = ChConfig {
            width_cnt: vec![32],
            no_hash: vec![0],
            cm_r,
            cm_w,
            ..ChConfig::default()
        };
        let ch = CounterHierarchy::new(num_cells as u64, config)?;
        Ok(QueryingCountingBloomFilter { num_hash: num_hash as u16, num_cells: num_cells as u64, ch })
    }

    fn cells(&self, key: &FlowKey<K>) -> Vec<usize> {
        (0..self.num_hash)
            .map(|h| (hash_flowkey(key, h as u64) % self.num_cells) as usize)
            .collect()
    }
}

impl<const K: usize> CountingSketch<K> for QueryingCountingBloomFilter<K> {
    fn update(&mut self, key: &FlowKey<K>, val: u64) {
        for c in self.cells(key) {
            self.ch.update_cnt(c, val as i64).expect("sketch sized too tightly");
        }
    }

    fn query(&self, key: &FlowKey<K>) -> u64 {
        self.cells(key)
            .iter()
            .map(|&c| self.ch.get_cnt(c))
            .min()
            .unwrap_or(0)
            .max(0) as u64
    }

    fn size(&self) -> u64 {
        self.ch.size()
    }

    fn clear(&mut self) {
        self.ch.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: u8) -> FlowKey<4> {
        FlowKey::from_bytes([b, 0, 0, 0])
    }

    #[test]
    fn query_returns_the_minimum_across_hashed_cells() {
        let mut filter = QueryingCountingBloomFilter::<4>::new(500, 4, 0, 0).unwrap();
        filter.update(&key(1), 10);
        assert_eq!(filter.query(&key(1)), 10);
    }

    #[test]
    fn distinct_keys_never_underestimate_their_own_updates() {
        let mut filter = QueryingCountingBloomFilter::<4>::new(2000, 5, 0, 0).unwrap();
        for i in 0..100u8 {
            filter.update(&key(i), (i as u64) + 1);
        }
        for i in 0..100u8 {
            assert!(filter.query(&key(i)) >= (i as u64) + 1);
        }
    }

    #[test]
    fn clear_resets_all_shared_cells() {
        let mut filter = QueryingCountingBloomFilter::<4>::new(100, 3, 0, 0).unwrap();
        filter.update(&key(1), 7);
        filter.clear();
        assert_eq!(filter.query(&key(1)), 0);
    }

    #[test]
    fn compensation_sketch_geometry_is_accepted() {
        let mut filter = QueryingCountingBloomFilter::<4>::new(100, 3, 4, 16).unwrap();
        filter.update(&key(1), 5);
        assert!(filter.query(&key(1)) >= 5);
    }
}
