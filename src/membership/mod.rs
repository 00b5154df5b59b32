//! Membership and frequency-over-membership testing: Counter-Hierarchy-backed
//! filters sharing one pool of cells across `nhash` hashes.

mod counting_bloom;
mod querying_counting_bloom;

pub use counting_bloom::CountingBloomFilter;
pub use querying_counting_bloom::QueryingCountingBloomFilter;
