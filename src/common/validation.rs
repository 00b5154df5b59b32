//! Validation utilities for sketch construction parameters.
//!
//! Every sketch constructor calls into these functions before allocating
//! any buffer, so a `ConfigInvalid` error never leaves partially
//! constructed state behind.

use crate::common::{Result, SketchError};

/// Validates that width and depth are both positive and within a sane
/// upper bound, shared by every `d x w` grid sketch (CU/CM, CountSketch,
/// Heavy-Keeper).
pub fn validate_width_depth(width: usize, depth: usize) -> Result<()> {
    const MAX_DIM: usize = 1 << 24;

    if width == 0 {
        return Err(SketchError::ConfigInvalid {
            reason: "width must be greater than 0".to_string(),
        });
    }
    if width > MAX_DIM {
        return Err(SketchError::ConfigInvalid {
            reason: format!("width must not exceed {MAX_DIM}, got {width}"),
        });
    }
    if depth == 0 {
        return Err(SketchError::ConfigInvalid {
            reason: "depth must be greater than 0".to_string(),
        });
    }
    if depth > MAX_DIM {
        return Err(SketchError::ConfigInvalid {
            reason: format!("depth must not exceed {MAX_DIM}, got {depth}"),
        });
    }
    Ok(())
}

/// Validates Bloom/counting-Bloom-filter-style parameters: a nonzero cell
/// count and a nonzero, bounded hash-function count.
pub fn validate_bloom_parameters(num_cells: usize, num_hash: usize) -> Result<()> {
    if num_cells == 0 {
        return Err(SketchError::ConfigInvalid {
            reason: "number of cells must be greater than 0".to_string(),
        });
    }
    if num_hash == 0 {
        return Err(SketchError::ConfigInvalid {
            reason: "number of hash functions must be greater than 0".to_string(),
        });
    }
    if num_hash > 64 {
        return Err(SketchError::ConfigInvalid {
            reason: format!("number of hash functions must not exceed 64, got {num_hash}"),
        });
    }
    Ok(())
}

/// Validates a StreamSummary/top-K capacity.
pub fn validate_capacity(capacity: usize) -> Result<()> {
    if capacity == 0 {
        return Err(SketchError::ConfigInvalid {
            reason: "capacity must be greater than 0".to_string(),
        });
    }
    Ok(())
}

/// Validates a Heavy-Keeper decay base `b > 1`.
pub fn validate_decay_base(b: f64) -> Result<()> {
    if !(b > 1.0) {
        return Err(SketchError::ConfigInvalid {
            reason: format!("decay base must be > 1.0, got {b}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_width_depth_valid() {
        assert!(validate_width_depth(1000, 4).is_ok());
    }

    #[test]
    fn test_validate_width_depth_invalid() {
        assert!(validate_width_depth(0, 4).is_err());
        assert!(validate_width_depth(1000, 0).is_err());
    }

    #[test]
    fn test_validate_bloom_parameters_valid() {
        assert!(validate_bloom_parameters(10000, 7).is_ok());
    }

    #[test]
    fn test_validate_bloom_parameters_invalid() {
        assert!(validate_bloom_parameters(0, 7).is_err());
        assert!(validate_bloom_parameters(10000, 0).is_err());
        assert!(validate_bloom_parameters(10000, 65).is_err());
    }

    #[test]
    fn test_validate_capacity() {
        assert!(validate_capacity(0).is_err());
        assert!(validate_capacity(1).is_ok());
    }

    #[test]
    fn test_validate_decay_base() {
        assert!(validate_decay_base(1.08).is_ok());
        assert!(validate_decay_base(1.0).is_err());
        assert!(validate_decay_base(0.5).is_err());
    }
}
