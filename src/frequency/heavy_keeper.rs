//! Heavy-Keeper: fingerprint-based heavy-hitter detection with exponential
//! decay, backed by a Counter Hierarchy and a doubly-linked StreamSummary.

use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashMap;

use crate::ch::CounterHierarchy;
use crate::common::hash::hash_flowkey;
use crate::common::validation::{validate_capacity, validate_decay_base, validate_width_depth};
use crate::common::{ChConfig, FlowKey, HeavySketch, CountingSketch, Result};

struct BucketNode {
    value: i64,
    prev: Option<usize>,
    next: Option<usize>,
    head_entry: Option<usize>,
}

struct EntryNode<const K: usize> {
    key: FlowKey<K>,
    bucket: usize,
    prev_entry: Option<usize>,
    next_entry: Option<usize>,
}

/// A capacity-bounded top-N tracker whose bucket list is kept strictly
/// sorted by value at all times, giving O(1) promote/evict/least-element
/// operations via an arena of slab-indexed nodes (no raw pointers, no
/// `Rc<RefCell<_>>`).
struct StreamSummary<const K: usize> {
    capacity: usize,
    buckets: Vec<Option<BucketNode>>,
    entries: Vec<Option<EntryNode<K>>>,
    free_buckets: Vec<usize>,
    free_entries: Vec<usize>,
    index: HashMap<FlowKey<K>, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<const K: usize> StreamSummary<K> {
    fn new(capacity: usize) -> Self {
        StreamSummary {
            capacity,
            buckets: Vec::new(),
            entries: Vec::new(),
            free_buckets: Vec::new(),
            free_entries: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn find(&self, key: &FlowKey<K>) -> Option<i64> {
        let entry_idx = *self.index.get(key)?;
        let entry = self.entries[entry_idx].as_ref().unwrap();
        Some(self.buckets[entry.bucket].as_ref().unwrap().value)
    }

    fn least_value(&self) -> i64 {
        match self.head {
            Some(b) => self.buckets[b].as_ref().unwrap().value,
            None => 0,
        }
    }

    fn alloc_bucket(&mut self, node: BucketNode) -> usize {
        if let Some(idx) = self.free_buckets.pop() {
            self.buckets[idx] = Some(node);
            idx
        } else {
            self.buckets.push(Some(node));
            self.buckets.len() - 1
        }
    }

    fn alloc_entry(&mut self, node: EntryNode<K>) -> usize {
        if let Some(idx) = self.free_entries.pop() {
            self.entries[idx] = Some(node);
            idx
        } else {
            self.entries.push(Some(node));
            self.entries.len() - 1
        }
    }

    /// Finds the bucket holding `value`, creating it in sorted position if
    /// absent. Returns its slab index.
    fn bucket_for_value(&mut self, value: i64) -> usize {
        // Scan from the tail since inserts/promotions tend to land near the
        // top of the list.
        let mut cursor = self.tail;
        let mut insert_before: Option<usize> = None;
        while let Some(b) = cursor {
            let node = self.buckets[b].as_ref().unwrap();
            if node.value == value {
                return b;
            }
            if node.value < value {
                break;
            }
            insert_before = Some(b);
            cursor = node.prev;
        }

        let new_bucket = BucketNode { value, prev: None, next: None, head_entry: None };
        let new_idx = self.alloc_bucket(new_bucket);

        match insert_before {
            Some(before) => {
                let prev = self.buckets[before].as_ref().unwrap().prev;
                self.buckets[new_idx].as_mut().unwrap().prev = prev;
                self.buckets[new_idx].as_mut().unwrap().next = Some(before);
                self.buckets[before].as_mut().unwrap().prev = Some(new_idx);
                match prev {
                    Some(p) => self.buckets[p].as_mut().unwrap().next = Some(new_idx),
                    None => self.head = Some(new_idx),
                }
            }
            None => {
                self.buckets[new_idx].as_mut().unwrap().prev = self.tail;
                match self.tail {
                    Some(t) => self.buckets[t].as_mut().unwrap().next = Some(new_idx),
                    None => self.head = Some(new_idx),
                }
                self.tail = Some(new_idx);
            }
        }
        new_idx
    }

    fn unlink_bucket_if_empty(&mut self, bucket_idx: usize) {
        let (prev, next, empty) = {
            let node = self.buckets[bucket_idx].as_ref().unwrap();
            (node.prev, node.next, node.head_entry.is_none())
        };
        if !empty {
            return;
        }
        match prev {
            Some(p) => self.buckets[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.buckets[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
        self.buckets[bucket_idx] = None;
        self.free_buckets.push(bucket_idx);
    }

    fn attach_entry(&mut self, bucket_idx: usize, entry_idx: usize) {
        let old_head = self.buckets[bucket_idx].as_ref().unwrap().head_entry;
        self.entries[entry_idx].as_mut().unwrap().prev_entry = None;
        self.entries[entry_idx].as_mut().unwrap().next_entry = old_head;
        self.entries[entry_idx].as_mut().unwrap().bucket = bucket_idx;
        if let Some(h) = old_head {
            self.entries[h].as_mut().unwrap().prev_entry = Some(entry_idx);
        }
        self.buckets[bucket_idx].as_mut().unwrap().head_entry = Some(entry_idx);
    }

    fn detach_entry(&mut self, entry_idx: usize) -> usize {
        let (bucket_idx, prev, next) = {
            let e = self.entries[entry_idx].as_ref().unwrap();
            (e.bucket, e.prev_entry, e.next_entry)
        };
        match prev {
            Some(p) => self.entries[p].as_mut().unwrap().next_entry = next,
            None => self.buckets[bucket_idx].as_mut().unwrap().head_entry = next,
        }
        if let Some(n) = next {
            self.entries[n].as_mut().unwrap().prev_entry = prev;
        }
        bucket_idx
    }

    /// Inserts a brand-new key at `value`, evicting the current minimum
    /// first if the summary is already at capacity. No-op (returns
    /// `false`) if the key is already tracked.
    fn insert(&mut self, key: FlowKey<K>, value: i64) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        if self.len() >= self.capacity {
            self.evict_min();
        }
        let entry_idx = self.alloc_entry(EntryNode { key, bucket: usize::MAX, prev_entry: None, next_entry: None });
        let bucket_idx = self.bucket_for_value(value);
        self.attach_entry(bucket_idx, entry_idx);
        self.index.insert(key, entry_idx);
        true
    }

    /// Moves an already-tracked key to `new_value`.
    fn promote(&mut self, key: &FlowKey<K>, new_value: i64) {
        let Some(&entry_idx) = self.index.get(key) else { return };
        let old_bucket = self.detach_entry(entry_idx);
        self.unlink_bucket_if_empty(old_bucket);
        let new_bucket = self.bucket_for_value(new_value);
        self.attach_entry(new_bucket, entry_idx);
    }

    fn evict_min(&mut self) {
        let Some(head) = self.head else { return };
        let Some(entry_idx) = self.buckets[head].as_ref().unwrap().head_entry else { return };
        let key = self.entries[entry_idx].as_ref().unwrap().key;
        self.index.remove(&key);
        let bucket_idx = self.detach_entry(entry_idx);
        self.entries[entry_idx] = None;
        self.free_entries.push(entry_idx);
        self.unlink_bucket_if_empty(bucket_idx);
    }

    /// Scans every live bucket head→tail, asserting strict monotonicity
    /// and single-ownership of each entry. Exposed for property tests.
    #[cfg(test)]
    fn check_invariants(&self) {
        let mut cursor = self.head;
        let mut last_value: Option<i64> = None;
        let mut seen = std::collections::HashSet::new();
        while let Some(b) = cursor {
            let node = self.buckets[b].as_ref().unwrap();
            if let Some(lv) = last_value {
                assert!(node.value > lv, "bucket values must strictly increase head to tail");
            }
            last_value = Some(node.value);
            let mut e = node.head_entry;
            while let Some(entry_idx) = e {
                assert!(seen.insert(entry_idx), "entry linked from more than one bucket");
                e = self.entries[entry_idx].as_ref().unwrap().next_entry;
            }
            cursor = node.next;
        }
        assert!(self.len() <= self.capacity);
    }
}

/// Heavy-Keeper: a CH-backed `d x w` fingerprint grid paired with a
/// bounded StreamSummary that surfaces the current top-N keys.
pub struct HeavyKeeper<const K: usize> {
    depth: usize,
    width: u64,
    decay_base: f64,
    counters: CounterHierarchy,
    fingerprints: Vec<u16>,
    summary: StreamSummary<K>,
    rng: StdRng,
}

impl<const K: usize> HeavyKeeper<K> {
    /// Builds a Heavy-Keeper tracking up to `capacity` heavy hitters over a
    /// `depth x width` grid, with decay base `decay_base` (> 1.0, typically
    /// 1.08) and the given seeded RNG for the decay coin flip.
    pub fn new(capacity: usize, depth: usize, width: usize, decay_base: f64, rng: StdRng) -> Result<Self> {
        validate_capacity(capacity)?;
        validate_width_depth(width, depth)?;
        validate_decay_base(decay_base)?;
        let width = crate::common::hash::sketch_table_width(width as u64);
        let config = ChConfig { width_cnt: vec![32], no_hash: vec![0], ..ChConfig::default() };
        let counters = CounterHierarchy::new(depth as u64 * width, config)?;
        Ok(HeavyKeeper {
            depth,
            width,
            decay_base,
            counters,
            fingerprints: vec![0u16; depth * width as usize],
            summary: StreamSummary::new(capacity),
            rng,
        })
    }

    fn cell(&self, row: usize, key: &FlowKey<K>) -> usize {
        let col = hash_flowkey(key, row as u64) % self.width;
        row * self.width as usize + col as usize
    }

    fn fingerprint(key: &FlowKey<K>) -> u16 {
        (hash_flowkey(key, 0x9E37_79B9) & 0xFFFF) as u16
    }

    fn update_impl(&mut self, key: &FlowKey<K>, val: u64) {
        let fp = Self::fingerprint(key);
        let cells: Vec<usize> = (0..self.depth).map(|r| self.cell(r, key)).collect();

        let n_min = self.summary.least_value();
        let tracked = self.summary.find(key).is_some();

        let mut hit = false;
        let mut est: i64 = 0;
        for &idx in &cells {
            let cnt = self.counters.get_original_cnt(idx);
            if self.fingerprints[idx] == fp && cnt > 0 && (tracked || cnt < n_min) {
                let new_val = cnt + val as i64;
                self.counters.update_cnt(idx, val as i64).expect("sketch sized too tightly");
                est = est.max(new_val);
                hit = true;
            }
        }

        if !hit {
            if let Some(&idx) = cells.iter().find(|&&idx| self.counters.get_original_cnt(idx) == 0) {
                self.fingerprints[idx] = fp;
                self.counters.reset_cnt(idx, val as i64);
                est = val as i64;
            } else {
                let min_idx = *cells
                    .iter()
                    .min_by_key(|&&idx| self.counters.get_original_cnt(idx))
                    .unwrap();
                let min_c = self.counters.get_original_cnt(min_idx);
                let decay_prob = self.decay_base.powi(-(min_c.max(0) as i32));
                if self.rng.random_bool(decay_prob.clamp(0.0, 1.0)) {
                    let new_c = min_c - val as i64;
                    if new_c <= 0 {
                        self.fingerprints[min_idx] = fp;
                        self.counters.reset_cnt(min_idx, 1);
                        est = 1;
                    } else {
                        self.counters.reset_cnt(min_idx, new_c);
                    }
                }
            }
        }

        if est > 0 {
            if let Some(current) = self.summary.find(key) {
                if est > current {
                    self.summary.promote(key, est);
                }
            } else if self.summary.len() < self.summary.capacity {
                self.summary.insert(*key, est);
            } else if est > self.summary.least_value() {
                self.summary.evict_min();
                self.summary.insert(*key, est);
            }
        }
    }
}

impl<const K: usize> CountingSketch<K> for HeavyKeeper<K> {
    fn update(&mut self, key: &FlowKey<K>, val: u64) {
        self.update_impl(key, val);
    }

    fn query(&self, key: &FlowKey<K>) -> u64 {
        self.summary.find(key).unwrap_or(0).max(0) as u64
    }

    fn size(&self) -> u64 {
        self.counters.size() + (self.fingerprints.len() * std::mem::size_of::<u16>()) as u64
    }

    fn clear(&mut self) {
        self.counters.clear();
        self.fingerprints.iter_mut().for_each(|f| *f = 0);
        self.summary = StreamSummary::new(self.summary.capacity);
    }
}

impl<const K: usize> HeavySketch<K> for HeavyKeeper<K> {
    fn get_heavy_hitter(&self, threshold: u64) -> HashMap<FlowKey<K>, u64> {
        self.summary
            .index
            .keys()
            .filter_map(|k| {
                let v = self.summary.find(k)?;
                (v as u64 >= threshold).then_some((*k, v as u64))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn key(b: u8) -> FlowKey<4> {
        FlowKey::from_bytes([b, 0, 0, 0])
    }

    fn sketch(capacity: usize, depth: usize, width: usize) -> HeavyKeeper<4> {
        HeavyKeeper::new(capacity, depth, width, 1.08, StdRng::seed_from_u64(42)).unwrap()
    }

    #[test]
    fn top_k_recovery_on_skewed_stream() {
        // S4 (scaled down): a handful of hot keys plus many cold ones.
        let mut hk = sketch(4, 4, 256);
        for _ in 0..1000 {
            hk.update(&key(b'A'), 1);
        }
        for _ in 0..500 {
            hk.update(&key(b'B'), 1);
        }
        for _ in 0..200 {
            hk.update(&key(b'C'), 1);
        }
        for _ in 0..100 {
            hk.update(&key(b'D'), 1);
        }
        for cold in 0..50u8 {
            for _ in 0..10 {
                hk.update(&key(100 + cold), 1);
            }
        }

        let hitters = hk.get_heavy_hitter(100);
        for hot in [b'A', b'B', b'C', b'D'] {
            assert!(hitters.contains_key(&key(hot)), "missing hot key {hot}");
        }
        assert_eq!(hk.query(&key(200)), 0);
    }

    #[test]
    fn stream_summary_invariants_hold_after_many_updates() {
        let mut hk = sketch(8, 3, 64);
        for i in 0..2000u32 {
            hk.update(&key((i % 40) as u8), 1);
        }
        hk.summary.check_invariants();
    }

    #[test]
    fn clear_empties_the_summary() {
        let mut hk = sketch(4, 2, 32);
        hk.update(&key(1), 50);
        hk.clear();
        assert_eq!(hk.query(&key(1)), 0);
        assert!(hk.get_heavy_hitter(1).is_empty());
    }
}
