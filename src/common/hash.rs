//! Hash functions for data sketches.
//!
//! Provides high-quality, non-cryptographic hash functions optimized for
//! probabilistic data structures, plus the two host-supplied primitives the
//! Counter Hierarchy and its consumers are built against: a seeded
//! `FlowKey` hash and `next_prime`.

use crate::common::flowkey::FlowKey;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// XXHash 64-bit implementation.
///
/// XXHash is an extremely fast non-cryptographic hash function designed by
/// Yann Collet. It offers excellent speed and distribution properties.
///
/// # Examples
/// ```
/// use sketch_oxide::common::hash::xxhash;
///
/// let hash = xxhash(b"hello world", 0);
/// println!("Hash: {}", hash);
/// ```
pub fn xxhash(data: &[u8], seed: u64) -> u64 {
    let mut hasher = XxHash64::with_seed(seed);
    hasher.write(data);
    hasher.finish()
}

/// Seeded hash of a [`FlowKey`]: the well-mixing `hash(key, seed) -> u64`
/// oracle the Counter Hierarchy and every CH-aware sketch are specified
/// against. Independent seeds give independent hash functions from the
/// same underlying xxHash64 family, the pattern the teacher's
/// `frequency::CountMinSketch` already relies on for its per-row derivation.
pub fn hash_flowkey<const K: usize>(key: &FlowKey<K>, seed: u64) -> u64 {
    xxhash(key.as_bytes(), seed)
}

/// Returns the smallest prime `p >= n`.
///
/// Used to size every Counter Hierarchy layer so that carry-routing hashes
/// taken `mod no_cnt[i]` distribute evenly. `n <= 2` returns `2`.
pub fn next_prime(n: u64) -> u64 {
    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate += 1;
    }
    candidate
}

/// Sizes a sketch row to `requested` columns, rounding up to the next
/// prime for anything bigger than a single bucket.
///
/// A requested width of exactly `1` is kept as-is rather than floored up
/// to `2`: a single-column row is a legitimate (if extreme) row width,
/// and every key is meant to collide in it.
pub fn sketch_table_width(requested: u64) -> u64 {
    if requested <= 1 {
        requested.max(1)
    } else {
        next_prime(requested)
    }
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    if n % 3 == 0 {
        return n == 3;
    }
    let mut i = 5u64;
    while i.saturating_mul(i) <= n {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}
