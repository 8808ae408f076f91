//! Bounded cache of parsed path segments.
//!
//! Splitting hot paths over and over dominates matching cost, so every
//! splitter in the crate routes through one shared [`SegmentCache`]. Cached
//! values are immutable shared slices; a caller can hold one for as long as
//! it likes without copying and without any way to corrupt other readers.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default number of parsed paths kept hot.
pub const DEFAULT_SEGMENT_CACHE_SIZE: usize = 1000;

/// LRU cache mapping a raw path/mask string to its parsed segment list.
pub struct SegmentCache {
    /// Recency-ordered entries; reads refresh recency, hence the mutex.
    cache: Mutex<LruCache<String, Arc<[String]>>>,

    /// Lookup hits since construction.
    hits: AtomicU64,

    /// Lookup misses since construction.
    misses: AtomicU64,
}

impl SegmentCache {
    /// Create a cache bounded to `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached segment list for `key`, counting the read as a use.
    pub fn get(&self, key: &str) -> Option<Arc<[String]>> {
        let found = self.cache.lock().get(key).cloned();

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }

        found
    }

    /// Insert a parsed segment list, evicting the least recently used entry
    /// once over capacity.
    pub fn put(&self, key: String, segments: Arc<[String]>) {
        self.cache.lock().put(key, segments);
    }

    /// Number of currently cached entries.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` since construction.
    pub fn counters(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl Default for SegmentCache {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENT_CACHE_SIZE)
    }
}
