//! Counter Hierarchy: a multi-layer bit-packed counter store with
//! hash-addressed carry propagation between layers.

use super::bitpacked::{sign_extend, BitPackedArray};
use super::carry_map::CarryMap;
use crate::common::hash::xxhash;
use crate::common::{ChConfig, Result, SketchError};

/// A host-supplied routing hash: given a cell index and a seed, returns a
/// well-mixing `u64`. Overflow propagation reduces this modulo the
/// destination layer's cell count.
///
/// Exposed as a plain function pointer (rather than a boxed closure) so
/// every hierarchy instance can share one default without per-instance
/// indirection, and so tests can substitute a deterministic routing
/// function.
pub type RouteHashFn = fn(u64, u64) -> u64;

fn default_route_hash(index: u64, seed: u64) -> u64 {
    xxhash(&index.to_le_bytes(), seed)
}

/// Multi-layer bit-packed counter store.
///
/// Presents a logical array of `no_cnt[0]` counters of effective width
/// `sum(width_cnt)`, while physically storing one [`BitPackedArray`] per
/// layer. Overflow from a full layer-0 cell is routed by hash into one or
/// more cells of layer 1, and so on up the hierarchy; [`Self::get_cnt`]
/// reconstructs the logical value by undoing that routing.
pub struct CounterHierarchy {
    config: ChConfig,
    layers: Vec<BitPackedArray>,
    no_cnt: Vec<u64>,
    /// `status[l]` has one bit per cell of layer `l` (for `l` in
    /// `0..layers.len() - 1`), set once that cell has ever overflowed into
    /// layer `l + 1`.
    status: Vec<Vec<bool>>,
    carry: CarryMap,
    compensation: Option<Vec<i64>>,
    route_hash: RouteHashFn,
}

impl CounterHierarchy {
    /// Builds a hierarchy whose layer 0 has `no_cnt0` cells, with layer
    /// sizes derived from `config.cnt_no_ratio` and widths from
    /// `config.width_cnt`. Uses the default xxHash-based routing hash.
    pub fn new(no_cnt0: u64, config: ChConfig) -> Result<Self> {
        Self::with_route_hash(no_cnt0, config, default_route_hash)
    }

    /// As [`Self::new`], but with an explicit routing hash function. Used
    /// by tests that need deterministic overflow destinations.
    pub fn with_route_hash(no_cnt0: u64, config: ChConfig, route_hash: RouteHashFn) -> Result<Self> {
        config.validate()?;
        if no_cnt0 == 0 {
            return Err(SketchError::ConfigInvalid {
                reason: "no_cnt0 must be greater than 0".to_string(),
            });
        }

        let num_layers = config.num_layers();
        let mut no_cnt = Vec::with_capacity(num_layers);
        no_cnt.push(no_cnt0);
        for l in 1..num_layers {
            let prev = no_cnt[l - 1];
            let raw = (prev as f64 * config.cnt_no_ratio).ceil() as u64;
            no_cnt.push(crate::common::hash::next_prime(raw.max(2)));
        }

        let layers = no_cnt
            .iter()
            .enumerate()
            .map(|(l, &n)| BitPackedArray::new(n as usize, config.width_cnt[l] as u32))
            .collect();

        let status = no_cnt[..num_layers.saturating_sub(1)]
            .iter()
            .map(|&n| vec![false; n as usize])
            .collect();

        let compensation = if config.cm_r > 0 {
            Some(vec![0i64; (config.cm_r * config.cm_w) as usize])
        } else {
            None
        };

        Ok(CounterHierarchy {
            config,
            layers,
            no_cnt,
            status,
            carry: CarryMap::new(),
            compensation,
            route_hash,
        })
    }

    /// Number of layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    fn destinations(&self, layer: usize, cell: u64) -> Vec<u64> {
        let next_n = self.no_cnt[layer + 1];
        let nhash = self.config.no_hash[layer + 1] as u64;
        (0..nhash)
            .map(|k| {
                let seed = ((layer as u64) << 32) | (k + 1);
                (self.route_hash)(cell, seed) % next_n
            })
            .collect()
    }

    fn compensation_add(&mut self, i: usize, delta: i64) {
        if let Some(cm) = &mut self.compensation {
            let w = self.config.cm_w as usize;
            let r = self.config.cm_r as usize;
            for row in 0..r {
                let seed = (row as u64) << 40;
                let col = (xxhash(&(i as u64).to_le_bytes(), seed) % w as u64) as usize;
                cm[row * w + col] += delta;
            }
        }
    }

    /// Adds `delta` to logical counter `i`.
    ///
    /// Layer 0 is always applied immediately, so [`Self::get_original_cnt`]
    /// is O(1) and up to date regardless of propagation mode. What differs
    /// is overflow handling: in eager mode, any overflow quantum is routed
    /// and applied to upper layers right away; in lazy mode it is instead
    /// accumulated in the internal [`CarryMap`] and only propagated when
    /// [`Self::drain_carry`] is called (which [`Self::get_cnt`] does on
    /// every call, so decoding always sees a consistent view).
    pub fn update_cnt(&mut self, i: usize, delta: i64) -> Result<()> {
        assert!(i < self.no_cnt[0] as usize, "index {i} out of range for layer 0");
        self.compensation_add(i, delta);

        let w0 = self.config.width_cnt[0];
        let quantum = if self.config.signed_mode {
            let old_raw = self.layers[0].get(i);
            let old_signed = sign_extend(old_raw, w0 as u32);
            let sum = old_signed as i128 + delta as i128;
            let half = 1i128 << (w0 - 1);
            let modulus = 1i128 << w0;
            let mut wrapped = sum;
            let mut quanta: i64 = 0;
            while wrapped >= half {
                wrapped -= modulus;
                quanta += 1;
            }
            while wrapped < -half {
                wrapped += modulus;
                quanta -= 1;
            }
            let mask = if w0 == 64 { u64::MAX } else { (1u64 << w0) - 1 };
            let new_raw = (wrapped as i64 as u64) & mask;
            self.layers[0].set(i, new_raw);
            quanta.unsigned_abs()
        } else {
            self.layers[0].add(i, delta as u64)
        };

        if quantum == 0 {
            return Ok(());
        }
        if self.layers.len() == 1 {
            return Err(SketchError::Overflow { layer: 0, by: quantum });
        }

        self.status[0][i] = true;
        if self.config.lazy {
            self.carry.add(i as u32, quantum as i64);
            return Ok(());
        }

        for d in self.destinations(0, i as u64) {
            self.propagate(1, d, quantum as i64)?;
        }
        Ok(())
    }

    /// Propagates every overflow quantum batched in the lazy-mode
    /// [`CarryMap`] up through the hierarchy, then empties the map. A
    /// no-op in eager mode, where propagation already happened inline.
    pub fn drain_carry(&mut self) -> Result<()> {
        for (idx, quantum) in self.carry.drain() {
            for d in self.destinations(0, idx as u64) {
                self.propagate(1, d, quantum)?;
            }
        }
        Ok(())
    }

    fn propagate(&mut self, layer: usize, idx: u64, delta: i64) -> Result<()> {
        let overflow = self.layers[layer].add(idx as usize, delta as u64);
        if overflow == 0 {
            return Ok(());
        }
        if layer == self.layers.len() - 1 {
            return Err(SketchError::Overflow { layer, by: overflow });
        }
        self.status[layer][idx as usize] = true;
        for d in self.destinations(layer, idx) {
            self.propagate(layer + 1, d, overflow as i64)?;
        }
        Ok(())
    }

    /// Directly sets the low-layer cell for `i` to `v`, clearing any
    /// propagated higher bits that applied to this index. Used by
    /// heavy-hitter eviction, which wants to start a slot fresh rather than
    /// accumulate against its prior history.
    pub fn reset_cnt(&mut self, i: usize, v: i64) {
        let w0 = self.config.width_cnt[0] as u32;
        let mask = if w0 == 64 { u64::MAX } else { (1u64 << w0) - 1 };
        self.layers[0].set(i, (v as u64) & mask);
        if !self.status.is_empty() {
            self.status[0][i] = false;
        }
    }

    /// O(1) read of the raw layer-0 cell, with no reconstruction.
    pub fn get_original_cnt(&self, i: usize) -> i64 {
        let raw = self.layers[0].get(i);
        if self.config.signed_mode {
            sign_extend(raw, self.config.width_cnt[0] as u32)
        } else {
            raw as i64
        }
    }

    /// Quick single-pass estimate: the layer-0 value plus, for each higher
    /// layer, the value at one chosen overflow destination (the first hash
    /// function's target). Cheap (`O(layers)`) but may be inflated by
    /// unrelated cells that share the same destination.
    pub fn get_est_cnt(&self, i: usize) -> i64 {
        let mut total = self.get_original_cnt(i) as i128;
        let mut shift = self.config.width_cnt[0] as u32;
        let mut cur = i as u64;
        for l in 0..self.layers.len() - 1 {
            let seed = ((l as u64) << 32) | 1;
            let dest = (self.route_hash)(cur, seed) % self.no_cnt[l + 1];
            let val = self.layers[l + 1].get(dest as usize);
            total += (val as i128) << shift;
            shift += self.config.width_cnt[l + 1] as u32;
            cur = dest;
        }
        total as i64
    }

    /// Full iterative message-passing reconstruction, authoritative over
    /// [`Self::get_est_cnt`]. Rebuilds, top layer down to layer 0, the
    /// bipartite graph between a layer's cells and the cells they may have
    /// overflowed into, then resolves per-cell overflow counts by
    /// alternating max/min relaxation for `decode_iters` rounds.
    pub fn get_cnt(&self, i: usize) -> i64 {
        if self.layers.len() == 1 {
            return self.get_original_cnt(i);
        }

        let top = self.layers.len() - 1;
        let mut values: Vec<Vec<i64>> = vec![Vec::new(); self.layers.len()];
        values[top] = (0..self.no_cnt[top] as usize)
            .map(|j| self.layers[top].get(j) as i64)
            .collect();

        // Lazy mode may still have overflow quanta sitting in the carry
        // map rather than already folded into layer 1's raw bits; fold
        // them in here so decoding sees an up-to-date view without
        // mutating the hierarchy.
        if top == 1 {
            self.inject_pending_carry(&mut values[1]);
        }

        for l in (1..=top).rev() {
            let lower_n = self.no_cnt[l - 1] as usize;
            let upper_n = self.no_cnt[l] as usize;
            let status = &self.status[l - 1];

            let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); upper_n];
            for j in 0..lower_n {
                if status[j] {
                    for d in self.destinations(l - 1, j as u64) {
                        incoming[d as usize].push(j);
                    }
                }
            }

            let upper_values = &values[l];
            let mut x: Vec<i64> = (0..lower_n).map(|j| if status[j] { 1 } else { 0 }).collect();

            let iters = self.config.decode_iters.max(1);
            let mut history: Vec<Vec<i64>> = Vec::new();
            for iter in 0..iters {
                let mut new_x = x.clone();
                for r in 0..upper_n {
                    let neighbors = &incoming[r];
                    if neighbors.is_empty() {
                        continue;
                    }
                    let sum_neighbors: i64 = neighbors.iter().map(|&j| x[j]).sum();
                    let a = upper_values[r] - sum_neighbors;
                    for &j in neighbors {
                        let message = (a + x[j]).max(1);
                        new_x[j] = if iter % 2 == 0 {
                            new_x[j].max(message)
                        } else {
                            if new_x[j] == x[j] {
                                message
                            } else {
                                new_x[j].min(message)
                            }
                        };
                    }
                }
                for v in new_x.iter_mut() {
                    if *v < 1 {
                        *v = 1;
                    }
                }
                history.push(x.clone());
                x = new_x;
            }
            history.push(x.clone());
            let final_x = if history.len() >= 2 {
                let a = &history[history.len() - 1];
                let b = &history[history.len() - 2];
                a.iter()
                    .zip(b.iter())
                    .map(|(&p, &q)| (p + q) / 2)
                    .collect()
            } else {
                x
            };

            let width_below = self.config.width_cnt[l - 1] as u32;
            let mut reconstructed = Vec::with_capacity(lower_n);
            for j in 0..lower_n {
                let raw = self.layers[l - 1].get(j) as i64;
                if status[j] {
                    reconstructed.push((final_x[j] << width_below) + raw);
                } else {
                    reconstructed.push(raw);
                }
            }
            values[l - 1] = reconstructed;
            if l - 1 == 1 && top > 1 {
                self.inject_pending_carry(&mut values[1]);
            }
        }

        values[0][i]
    }

    fn inject_pending_carry(&self, layer1_values: &mut [i64]) {
        for (idx, quantum) in self.carry.iter() {
            for d in self.destinations(0, idx as u64) {
                layer1_values[d as usize] += quantum;
            }
        }
    }

    /// Zeroes every layer, status bit, and the lazy carry map.
    pub fn clear(&mut self) {
        for layer in &mut self.layers {
            layer.clear();
        }
        for s in &mut self.status {
            s.iter_mut().for_each(|b| *b = false);
        }
        self.carry = CarryMap::new();
        if let Some(cm) = &mut self.compensation {
            cm.iter_mut().for_each(|v| *v = 0);
        }
    }

    /// Physical footprint in bytes: layer buffers, status bits, and the
    /// compensation sketch if present.
    pub fn size(&self) -> u64 {
        let layers: u64 = self.layers.iter().map(|l| l.size_bytes()).sum();
        let status_bits: u64 = self.status.iter().map(|s| (s.len() as u64 + 7) / 8).sum();
        let comp = self
            .compensation
            .as_ref()
            .map(|c| (c.len() * std::mem::size_of::<i64>()) as u64)
            .unwrap_or(0);
        layers + status_bits + comp
    }

    /// Heuristically estimates the sign of the true value accumulated at
    /// cell `i`, by comparing the compensation sketch (if present) against
    /// the tracked magnitude. Defined for completeness of the decode
    /// surface; no sketch in this crate's roster currently calls it.
    pub fn guess_sign(&self, i: usize) -> i8 {
        match &self.compensation {
            Some(cm) if !cm.is_empty() => {
                let w = self.config.cm_w as usize;
                let r = self.config.cm_r as usize;
                let mut total = 0i64;
                for row in 0..r {
                    let seed = (row as u64) << 40;
                    let col = (xxhash(&(i as u64).to_le_bytes(), seed) % w as u64) as usize;
                    total += cm[row * w + col];
                }
                if total > 0 {
                    1
                } else if total < 0 {
                    -1
                } else {
                    0
                }
            }
            _ => {
                if self.get_original_cnt(i) >= 0 {
                    1
                } else {
                    -1
                }
            }
        }
    }
}
