//! Frequency estimation: Counter-Hierarchy-backed sketches that answer
//! "how often has this key been seen".

mod count_sketch;
mod cu_cm;
mod heavy_keeper;

pub use count_sketch::CountSketch;
pub use cu_cm::CuCmSketch;
pub use heavy_keeper::HeavyKeeper;
