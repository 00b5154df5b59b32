//! Sketch surface: the trait hierarchy every Counter-Hierarchy-backed
//! sketch implements a subset of.
//!
//! The source this library is ported from expresses all of these through
//! `SketchBase`'s virtual-inheritance lattice. This repository flattens
//! that into four independent traits, segregated by the operations a
//! sketch family actually supports — a Bloom filter has no `query`, a
//! plain counting sketch has no `get_heavy_hitter`.

use crate::common::error::Result;
use crate::common::flowkey::FlowKey;
use std::collections::HashMap;

/// A sketch that tracks per-key frequency: `update` adds to a key's count,
/// `query` reads an estimate back.
///
/// # Examples
/// ```
/// use sketch_oxide::common::{CountingSketch, FlowKey};
/// use sketch_oxide::frequency::CuCmSketch;
///
/// let mut cm = CuCmSketch::<4>::count_min(3, 64).unwrap();
/// let key = FlowKey::from_bytes([1, 2, 3, 4]);
/// cm.update(&key, 5);
/// assert!(cm.query(&key) >= 5);
/// ```
pub trait CountingSketch<const K: usize> {
    /// Adds `val` to the estimated frequency of `key`.
    fn update(&mut self, key: &FlowKey<K>, val: u64);

    /// Returns the current frequency estimate for `key`.
    fn query(&self, key: &FlowKey<K>) -> u64;

    /// Physical footprint in bytes.
    fn size(&self) -> u64;

    /// Returns the sketch to its state immediately after construction.
    fn clear(&mut self);
}

/// A [`CountingSketch`] that additionally maintains a best-effort
/// heavy-hitter set.
pub trait HeavySketch<const K: usize>: CountingSketch<K> {
    /// Returns every tracked key whose estimated frequency is at least
    /// `threshold`.
    fn get_heavy_hitter(&self, threshold: u64) -> HashMap<FlowKey<K>, u64>;
}

/// Set-membership sketches: `insert` records a key, `lookup` tests
/// membership. False positives are permitted; false negatives are not,
/// unless the implementation's documentation says otherwise (e.g. a
/// counting variant whose counters can be decremented below zero-knowledge).
pub trait BloomFilter<const K: usize> {
    /// Records `key` as present.
    fn insert(&mut self, key: &FlowKey<K>);

    /// Tests whether `key` may be present.
    fn lookup(&self, key: &FlowKey<K>) -> bool;

    /// Physical footprint in bytes.
    fn size(&self) -> u64;

    /// Returns the sketch to its state immediately after construction.
    fn clear(&mut self);
}

/// Sketches that reconstruct an explicit key/value map rather than
/// answering point queries (CounterBraids, FlowRadar in the wider family).
/// No type in this repository implements it today; it is defined so the
/// surface is complete for sketches built on top of this crate.
pub trait DecodingSketch<const K: usize> {
    /// Attempts to recover the full set of tracked `(key, value)` pairs.
    /// Fails if the underlying system of equations is underdetermined.
    fn decode(&self) -> Result<HashMap<FlowKey<K>, u64>>;
}
