//! Count-Min and Conservative-Update sketches: a `d x w` grid of counters
//! stored in one Counter Hierarchy, differing only in whether an update
//! writes every row or only the rows below the new minimum.

use crate::ch::CounterHierarchy;
use crate::common::hash::hash_flowkey;
use crate::common::validation::validate_width_depth;
use crate::common::{ChConfig, CountingSketch, FlowKey, Result};

/// Count-Min / Conservative-Update sketch.
///
/// Both variants share this one implementation, distinguished by the
/// `conservative` flag: plain Count-Min always adds `val` to every row,
/// while Conservative-Update raises only the rows that sit below the new
/// minimum, which trades a slightly more expensive update for a tighter
/// (never-larger) estimate.
///
/// # Examples
/// ```
/// use sketch_oxide::common::{CountingSketch, FlowKey};
/// use sketch_oxide::frequency::CuCmSketch;
///
/// let mut cu = CuCmSketch::<4>::conservative_update(3, 64).unwrap();
/// let a = FlowKey::from_bytes([1, 0, 0, 0]);
/// cu.update(&a, 5);
/// assert_eq!(cu.query(&a), 5);
/// ```
pub struct CuCmSketch<const K: usize> {
    depth: usize,
    width: u64,
    conservative: bool,
    ch: CounterHierarchy,
}

impl<const K: usize> CuCmSketch<K> {
    fn new(depth: usize, width: usize, conservative: bool) -> Result<Self> {
        validate_width_depth(width, depth)?;
        let width = crate::common::hash::sketch_table_width(width as u64);
        let config = ChConfig {
            width_cnt: vec![32],
            no_hash: vec![0],
            ..ChConfig::default()
        };
        let ch = CounterHierarchy::new(depth as u64 * width, config)?;
        Ok(CuCmSketch { depth, width, conservative, ch })
    }

    /// Builds a plain Count-Min sketch with `depth` rows and `width`
    /// columns per row (rounded up to the next prime).
    pub fn count_min(depth: usize, width: usize) -> Result<Self> {
        Self::new(depth, width, false)
    }

    /// Builds a Conservative-Update sketch with `depth` rows and `width`
    /// columns per row (rounded up to the next prime).
    pub fn conservative_update(depth: usize, width: usize) -> Result<Self> {
        Self::new(depth, width, true)
    }

    fn row_index(&self, row: usize, key: &FlowKey<K>) -> usize {
        let col = hash_flowkey(key, row as u64) % self.width;
        row * self.width as usize + col as usize
    }
}

impl<const K: usize> CountingSketch<K> for CuCmSketch<K> {
    fn update(&mut self, key: &FlowKey<K>, val: u64) {
        let indices: Vec<usize> = (0..self.depth).map(|r| self.row_index(r, key)).collect();

        if !self.conservative {
            for &idx in &indices {
                self.ch.update_cnt(idx, val as i64).expect("sketch sized too tightly");
            }
            return;
        }

        let estimates: Vec<i64> = indices.iter().map(|&idx| self.ch.get_est_cnt(idx)).collect();
        let min = estimates.iter().copied().min().unwrap_or(0);
        let target = min + val as i64;
        for (&idx, &est) in indices.iter().zip(estimates.iter()) {
            if est < target {
                self.ch.update_cnt(idx, target - est).expect("sketch sized too tightly");
            }
        }
    }

    fn query(&self, key: &FlowKey<K>) -> u64 {
        (0..self.depth)
            .map(|r| self.ch.get_cnt(self.row_index(r, key)))
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
    fn cm_sums_collisions_cu_does_not() {
        // S2: d=1, w=1 forces A and B into the same single cell.
        let mut cm = CuCmSketch::<4>::count_min(1, 1).unwrap();
        let mut cu = CuCmSketch::<4>::conservative_update(1, 1).unwrap();

        let a = key(b'A');
        let b = key(b'B');

        cm.update(&a, 5);
        cm.update(&b, 3);
        assert_eq!(cm.query(&a), 8);
        assert_eq!(cm.query(&b), 8);

        cu.update(&a, 5);
        cu.update(&b, 3);
        assert_eq!(cu.query(&a), 5);
        assert_eq!(cu.query(&b), 3);
    }

    #[test]
    fn cu_never_overestimates_cm() {
        let mut cm = CuCmSketch::<4>::count_min(4, 32).unwrap();
        let mut cu = CuCmSketch::<4>::conservative_update(4, 32).unwrap();
        for i in 0..50u8 {
            let k = key(i);
            cm.update(&k, (i as u64) + 1);
            cu.update(&k, (i as u64) + 1);
        }
        for i in 0..50u8 {
            let k = key(i);
            assert!(cu.query(&k) <= cm.query(&k));
            assert!(cm.query(&k) >= (i as u64) + 1);
        }
    }

    #[test]
    fn clear_resets_every_counter() {
        let mut cm = CuCmSketch::<4>::count_min(2, 16).unwrap();
        cm.update(&key(1), 10);
        cm.clear();
        assert_eq!(cm.query(&key(1)), 0);
    }
}
