//! Count Sketch: a signed-counter frequency sketch that cancels collision
//! noise via random ±1 signs and a median-of-rows query.

use crate::ch::CounterHierarchy;
use crate::common::hash::hash_flowkey;
use crate::common::validation::validate_width_depth;
use crate::common::{ChConfig, CountingSketch, FlowKey, Result};

/// A Count Sketch backed by one signed Counter Hierarchy of `depth * width`
/// cells. Each row derives an independent position hash and an independent
/// sign hash from the same key, so collisions in a row cancel out in
/// expectation rather than always inflating the estimate the way Count-Min's
/// unsigned collisions do.
pub struct CountSketch<const K: usize> {
    depth: usize,
    width: u64,
    ch: CounterHierarchy,
}

impl<const K: usize> CountSketch<K> {
    /// Builds a sketch with `depth` rows (at least 1) and `width` columns
    /// per row (rounded up to the next prime).
    pub fn new(depth: usize, width: usize) -> Result<Self> {
        validate_width_depth(width, depth)?;
        let width = crate::common::hash::sketch_table_width(width as u64);
        let config = ChConfig {
            width_cnt: vec![40],
            no_hash: vec![0],
            signed_mode: true,
            ..ChConfig::default()
        };
        let ch = CounterHierarchy::new(depth as u64 * width, config)?;
        Ok(CountSketch { depth, width, ch })
    }

    fn position(&self, row: usize, key: &FlowKey<K>) -> usize {
        let col = hash_flowkey(key, row as u64 * 2) % self.width;
        row * self.width as usize + col as usize
    }

    /// `+1` or `-1`, derived from a hash independent of the position hash.
    fn sign(&self, row: usize, key: &FlowKey<K>) -> i64 {
        if hash_flowkey(key, row as u64 * 2 + 1) & 1 == 0 {
            1
        } else {
            -1
        }
    }

    fn median(mut values: Vec<i64>) -> i64 {
        values.sort_unstable();
        let n = values.len();
        if n == 0 {
            return 0;
        }
        if n % 2 == 1 {
            values[n / 2]
        } else {
            (values[n / 2 - 1] + values[n / 2]) / 2
        }
    }
}

impl<const K: usize> CountingSketch<K> for CountSketch<K> {
    fn update(&mut self, key: &FlowKey<K>, val: u64) {
        for row in 0..self.depth {
            let idx = self.position(row, key);
            let signed_val = self.sign(row, key) * val as i64;
            self.ch.update_cnt(idx, signed_val).expect("sketch sized too tightly");
        }
    }

    fn query(&self, key: &FlowKey<K>) -> u64 {
        let signed_estimates: Vec<i64> = (0..self.depth)
            .map(|row| {
                let idx = self.position(row, key);
                self.ch.get_cnt(idx) * self.sign(row, key)
            })
            .collect();
        Self::median(signed_estimates).unsigned_abs()
    }

    fn size(&self) -> u64 {
        self.ch.size()
    }

    fn clear(&mut self) {
        self.ch.clear();
    }
}
