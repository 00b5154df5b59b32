//! Error types for Counter-Hierarchy-backed sketch operations.
//!
//! The library recognizes exactly two recoverable failure kinds. A third
//! kind, indexing a Counter Hierarchy cell outside its configured range, is
//! not represented here: it is a programming error in the calling sketch
//! (every hash-derived index is taken modulo the layer's cell count before
//! it ever reaches the hierarchy), so it panics instead of returning a
//! `Result`, the same way an out-of-bounds slice index panics.

use std::fmt;

/// Errors that can occur constructing or updating a sketch built on a
/// Counter Hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SketchError {
    /// A construction-time parameter violates a geometry or configuration
    /// invariant (layer widths, hash counts, ratios, capacities). Raised
    /// before any buffer is allocated.
    ConfigInvalid {
        /// Human-readable explanation of which invariant was violated.
        reason: String,
    },

    /// The top layer of a Counter Hierarchy overflowed while propagating a
    /// carry during `update_cnt`. Fatal to the stream: the hierarchy was
    /// sized too tightly for the observed workload and must be rebuilt
    /// larger by the caller.
    Overflow {
        /// Index of the layer that overflowed.
        layer: usize,
        /// Magnitude of the overflow that could not be absorbed.
        by: u64,
    },
}

impl fmt::Display for SketchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SketchError::ConfigInvalid { reason } => {
                write!(f, "invalid configuration: {reason}")
            }
            SketchError::Overflow { layer, by } => {
                write!(f, "counter hierarchy overflow at layer {layer} by {by}")
            }
        }
    }
}

impl std::error::Error for SketchError {}

/// Result type alias for sketch operations.
pub type Result<T> = std::result::Result<T, SketchError>;
