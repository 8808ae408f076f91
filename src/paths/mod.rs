//! Path and mask algebra with a shared parse cache.

mod algebra;
mod cache;

pub use algebra::{PathAlgebra, SEPARATOR, WILDCARD};
pub use cache::{SegmentCache, DEFAULT_SEGMENT_CACHE_SIZE};
