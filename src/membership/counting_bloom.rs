//! Counting Bloom filter backed by a Counter Hierarchy: `nhash` hashes
//! address cells of one shared CH of `ncnt` cells.

use crate::ch::CounterHierarchy;
use crate::common::hash::hash_flowkey;
use crate::common::validation::validate_bloom_parameters;
use crate::common::{BloomFilter, ChConfig, FlowKey, Result};

/// A counting Bloom filter with a symmetric insert/remove guard: an insert
/// is a no-op once every one of a key's cells is already nonzero (it is
/// already fully represented), and a remove is a no-op unless every cell
/// is currently nonzero, so it never decrements a cell that a lookup would
/// already report absent. Insert checks the cheap single-pass estimate;
/// remove checks the authoritative decoded count, since decrementing on a
/// stale read is the mistake that actually corrupts shared cells.
pub struct CountingBloomFilter<const K: usize> {
    num_hash: u16,
    num_cells: u64,
    ch: CounterHierarchy,
}

impl<const K: usize> CountingBloomFilter<K> {
    /// Builds a filter addressing `num_cells` shared cells via `num_hash`
    /// independent hashes.
    pub fn new(num_cells: usize, num_hash: usize) -> Result<Self> {
        validate_bloom_parameters(num_cells, num_hash)?;
        let config = ChConfig {
            width_cnt: vec![16],
            no_hash: vec![0],
            ..ChConfig::default()
        };
        let ch = CounterHierarchy::new(num_cells as u64, config)?;
        Ok(CountingBloomFilter { num_hash: num_hash as u16, num_cells: num_cells as u64, ch })
    }

    fn cells(&self, key: &FlowKey<K>) -> Vec<usize> {
        (0..self.num_hash)
            .map(|h| (hash_flowkey(key, h as u64) % self.num_cells) as usize)
            .collect()
    }

    /// Removes a previously inserted key, subject to the symmetric guard.
    pub fn remove(&mut self, key: &FlowKey<K>) {
        let cells = self.cells(key);
        if cells.iter().all(|&c| self.ch.get_cnt(c) > 0) {
            for c in cells {
                self.ch.update_cnt(c, -1).expect("sketch sized too tightly");
            }
        }
    }
}

impl<const K: usize> BloomFilter<K> for CountingBloomFilter<K> {
    fn insert(&mut self, key: &FlowKey<K>) {
        let cells = self.cells(key);
        if cells.iter().any(|&c| self.ch.get_est_cnt(c) == 0) {
            for c in cells {
                self.ch.update_cnt(c, 1).expect("sketch sized too tightly");
            }
        }
    }

    fn lookup(&self, key: &FlowKey<K>) -> bool {
        self.cells(key).iter().all(|&c| self.ch.get_cnt(c) > 0)
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
    fn no_false_negatives_after_many_inserts() {
        // S6: 300 distinct keys, all must look up true.
        let mut filter = CountingBloomFilter::<4>::new(1000, 7).unwrap();
        for i in 0u16..300 {
            let k = FlowKey::from_bytes([(i & 0xFF) as u8, (i >> 8) as u8, 0, 0]);
            filter.insert(&k);
        }
        for i in 0u16..300 {
            let k = FlowKey::from_bytes([(i & 0xFF) as u8, (i >> 8) as u8, 0, 0]);
            assert!(filter.lookup(&k), "false negative for inserted key {i}");
        }
    }

    #[test]
    fn repeated_insert_is_a_no_op_once_fully_represented() {
        let mut filter = CountingBloomFilter::<4>::new(100, 3).unwrap();
        let k = key(1);
        filter.insert(&k);
        let size_after_first = filter.size();
        filter.insert(&k);
        filter.insert(&k);
        assert_eq!(filter.size(), size_after_first);
        assert!(filter.lookup(&k));
    }

    #[test]
    fn remove_then_lookup_reflects_absence() {
        let mut filter = CountingBloomFilter::<4>::new(200, 5).unwrap();
        let k = key(9);
        filter.insert(&k);
        assert!(filter.lookup(&k));
        filter.remove(&k);
        assert!(!filter.lookup(&k));
    }

    #[test]
    fn remove_of_never_inserted_key_is_a_no_op() {
        let mut filter = CountingBloomFilter::<4>::new(100, 4).unwrap();
        filter.remove(&key(5));
        assert!(!filter.lookup(&key(5)));
    }
}
