//! Construction-time configuration for a [`CounterHierarchy`](crate::ch::CounterHierarchy).

use super::error::{Result, SketchError};

/// Default number of decode iterations for the `getCnt` message-passing
/// reconstruction. Kept as a field rather than a hardcoded constant per the
/// first open question recorded in `DESIGN.md` — the source treats this as
/// a compile-time `#define`, but nothing about the algorithm requires that.
pub const DEFAULT_DECODE_ITERS: u32 = 10;

/// Geometry and behavior knobs for a Counter Hierarchy.
///
/// `no_cnt[0]`, the number of layer-0 cells, is decided by the enclosing
/// sketch (typically `depth * width`) and passed separately to
/// [`CounterHierarchy::new`](crate::ch::CounterHierarchy::new); every layer
/// above it is derived from `cnt_no_ratio`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChConfig {
    /// Bit width of each layer's cells, one entry per layer. `width_cnt[0]`
    /// is the logical counter's "fast path" width; `width_cnt[1..]` are the
    /// successive overflow layers.
    pub width_cnt: Vec<u16>,
    /// Ratio applied to a layer's cell count to size the next layer:
    /// `no_cnt[i+1] = next_prime(ceil(no_cnt[i] * cnt_no_ratio))`.
    pub cnt_no_ratio: f64,
    /// Number of carry-routing hashes used when propagating overflow from
    /// layer `i-1` into layer `i`. `no_hash[0]` is unused (layer 0 has
    /// nothing below it) and is conventionally 0.
    pub no_hash: Vec<u16>,
    /// Whether layer 0 stores signed (two's-complement) values.
    pub signed_mode: bool,
    /// Whether overflow propagation is deferred to decode time (`true`) or
    /// applied immediately on every `update_cnt` (`false`).
    pub lazy: bool,
    /// Compensation sketch depth (rows). `0` disables the compensation
    /// sketch.
    pub cm_r: u32,
    /// Compensation sketch width (columns per row).
    pub cm_w: u32,
    /// Number of message-passing iterations used by `getCnt`'s decode path.
    pub decode_iters: u32,
}

impl ChConfig {
    /// Number of layers implied by this configuration.
    pub fn num_layers(&self) -> usize {
        self.width_cnt.len()
    }

    /// Validates the configuration, returning [`SketchError::ConfigInvalid`]
    /// on the first violated invariant. Called before any buffer is
    /// allocated.
    pub fn validate(&self) -> Result<()> {
        let l = self.width_cnt.len();
        if l == 0 {
            return Err(SketchError::ConfigInvalid {
                reason: "width_cnt must have at least one layer".to_string(),
            });
        }
        if self.no_hash.len() != l {
            return Err(SketchError::ConfigInvalid {
                reason: format!(
                    "no_hash has {} entries but width_cnt has {l} layers",
                    self.no_hash.len()
                ),
            });
        }
        let total_width: u32 = self.width_cnt.iter().map(|&w| w as u32).sum();
        if total_width >= 64 {
            return Err(SketchError::ConfigInvalid {
                reason: format!(
                    "sum of layer widths must be < 64 to fit a reconstructed value in one \
                     machine word, got {total_width}"
                ),
            });
        }
        for (i, &w) in self.width_cnt.iter().enumerate() {
            if w == 0 || w > 64 {
                return Err(SketchError::ConfigInvalid {
                    reason: format!("width_cnt[{i}] = {w} must be in [1, 64]"),
                });
            }
        }
        for (i, &h) in self.no_hash.iter().enumerate().skip(1) {
            if h == 0 {
                return Err(SketchError::ConfigInvalid {
                    reason: format!("no_hash[{i}] must be >= 1"),
                });
            }
        }
        if l > 1 && !(0.0 < self.cnt_no_ratio && self.cnt_no_ratio < 1.0) {
            return Err(SketchError::ConfigInvalid {
                reason: format!(
                    "cnt_no_ratio must be in (0, 1), got {}",
                    self.cnt_no_ratio
                ),
            });
        }
        if (self.cm_r == 0) != (self.cm_w == 0) {
            return Err(SketchError::ConfigInvalid {
                reason: "cm_r and cm_w must both be zero or both be nonzero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ChConfig {
    /// A single-layer, eager, unsigned hierarchy with no compensation
    /// sketch — the simplest configuration that never propagates overflow.
    fn default() -> Self {
        ChConfig {
            width_cnt: vec![32],
            cnt_no_ratio: 0.5,
            no_hash: vec![0],
            signed_mode: false,
            lazy: false,
            cm_r: 0,
            cm_w: 0,
            decode_iters: DEFAULT_DECODE_ITERS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ChConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_width_sum_over_64() {
        let cfg = ChConfig {
            width_cnt: vec![40, 30],
            no_hash: vec![0, 1],
            ..ChConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_mismatched_no_hash_length() {
        let cfg = ChConfig {
            width_cnt: vec![8, 8],
            no_hash: vec![0],
            ..ChConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_no_hash_above_layer_zero() {
        let cfg = ChConfig {
            width_cnt: vec![8, 8],
            no_hash: vec![0, 0],
            ..ChConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_ratio_out_of_range_for_multilayer() {
        let cfg = ChConfig {
            width_cnt: vec![8, 8],
            no_hash: vec![0, 1],
            cnt_no_ratio: 1.5,
            ..ChConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_partial_compensation_sketch_geometry() {
        let cfg = ChConfig {
            cm_r: 4,
            cm_w: 0,
            ..ChConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
