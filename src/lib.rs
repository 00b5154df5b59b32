//! sketch_oxide: probabilistic sketch data structures for network-flow
//! telemetry, built on a shared Counter Hierarchy.
//!
//! A Counter Hierarchy ([`ch::CounterHierarchy`]) presents a logical array
//! of wide counters while physically storing them as a stack of
//! narrow, bit-packed layers; overflow from one layer is routed by hash
//! into the next. Every sketch in [`frequency`] and [`membership`] is a
//! thin addressing scheme (which cells does this key touch, and how) laid
//! on top of one shared hierarchy.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ch;
pub mod common;
pub mod frequency;
pub mod membership;

pub use common::{hash, BloomFilter, ChConfig, CountingSketch, DecodingSketch, FlowKey, HeavySketch, Result, SketchError};
pub use frequency::{CountSketch, CuCmSketch, HeavyKeeper};
pub use membership::{CountingBloomFilter, QueryingCountingBloomFilter};
