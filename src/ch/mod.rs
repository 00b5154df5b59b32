//! Counter Hierarchy: the bit-packed, hash-routed counter store every
//! frequency and membership sketch in this crate is built on.

mod bitpacked;
mod carry_map;
mod hierarchy;

pub use bitpacked::{sign_extend, BitPackedArray};
pub use carry_map::CarryMap;
pub use hierarchy::{CounterHierarchy, RouteHashFn};
