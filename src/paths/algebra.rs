//! Pattern matching over dot-separated paths and wildcard masks.
//!
//! A mask is a path in which whole segments may be the wildcard `*`; partial
//! wildcards are not a thing. Matching and intersection share one
//! length-then-segment walk, relaxed by two independent extension flags. All
//! splitting routes through a shared [`SegmentCache`].

use crate::error::{Result, RouteError};
use crate::paths::cache::SegmentCache;
use std::sync::Arc;

/// Segment separator in paths, masks and type names.
pub const SEPARATOR: char = '.';

/// Mask segment matching any single concrete segment.
pub const WILDCARD: &str = "*";

/// Pure path/mask operations around a shared segment cache.
pub struct PathAlgebra {
    cache: Arc<SegmentCache>,
}

impl PathAlgebra {
    /// Build the algebra around an existing cache.
    pub fn new(cache: Arc<SegmentCache>) -> Self {
        Self { cache }
    }

    /// The shared segment cache (diagnostics and benches).
    pub fn cache(&self) -> &SegmentCache {
        &self.cache
    }

    // --- Splitting ---

    /// Ordered segment list of `path`. The empty (root) path has no segments.
    pub fn split(&self, path: &str) -> Arc<[String]> {
        if path.is_empty() {
            return Vec::new().into();
        }

        if let Some(cached) = self.cache.get(path) {
            return cached;
        }

        let segments: Arc<[String]> =
            path.split(SEPARATOR).map(|s| s.to_string()).collect();
        self.cache.put(path.to_string(), Arc::clone(&segments));
        segments
    }

    /// True iff `s` contains a wildcard segment.
    pub fn is_mask(&self, s: &str) -> bool {
        s.contains(WILDCARD)
    }

    // --- Matching ---

    /// Test `path` against `mask`.
    ///
    /// With both flags off the lengths must agree exactly.
    /// `context_may_extend_mask` accepts a path carrying extra trailing
    /// segments beyond the mask; `mask_may_extend_context` accepts a mask
    /// longer than the path. A wildcard matches exactly one segment.
    pub fn matches(
        &self,
        mask: &str,
        path: &str,
        context_may_extend_mask: bool,
        mask_may_extend_context: bool,
    ) -> bool {
        if !self.is_mask(mask) {
            // Literal target: equality, or a prefix relation at a segment
            // boundary when the flag for the longer side is set.
            return mask == path
                || (context_may_extend_mask && extends_at_boundary(mask, path))
                || (mask_may_extend_context && extends_at_boundary(path, mask));
        }

        self.segments_compatible(mask, path, context_may_extend_mask, mask_may_extend_context)
    }

    /// True iff some concrete path could satisfy both masks.
    ///
    /// Symmetric under swapping the masks together with their flags:
    /// `intersect(a, b, x, y) == intersect(b, a, y, x)`.
    pub fn intersect(
        &self,
        mask_a: &str,
        mask_b: &str,
        b_may_extend_a: bool,
        a_may_extend_b: bool,
    ) -> bool {
        self.segments_compatible(mask_a, mask_b, b_may_extend_a, a_may_extend_b)
    }

    /// Length-then-segment walk shared by `matches` and `intersect`: reject a
    /// length mismatch unless the flag for the longer side permits it, then
    /// compare up to the shorter length where only literal/literal mismatch
    /// fails.
    fn segments_compatible(
        &self,
        first: &str,
        second: &str,
        second_may_extend_first: bool,
        first_may_extend_second: bool,
    ) -> bool {
        let first = self.split(first);
        let second = self.split(second);

        if second.len() > first.len() && !second_may_extend_first {
            return false;
        }
        if first.len() > second.len() && !first_may_extend_second {
            return false;
        }

        first
            .iter()
            .zip(second.iter())
            .all(|(a, b)| a == WILDCARD || b == WILDCARD || a == b)
    }

    /// True iff `parent_type`'s segments are a segment-for-segment prefix of
    /// `child_type`'s (a type derives from itself).
    pub fn is_derived_from(&self, child_type: &str, parent_type: &str) -> bool {
        let child = self.split(child_type);
        let parent = self.split(parent_type);

        if parent.len() > child.len() {
            return false;
        }

        parent.iter().zip(child.iter()).all(|(p, c)| p == c)
    }

    // --- Decomposition ---

    /// Parent of `path`, `None` for the root. Relative paths are rejected.
    pub fn parent_path(&self, path: &str) -> Result<Option<String>> {
        reject_relative(path)?;

        if path.is_empty() {
            return Ok(None);
        }

        match path.rfind(SEPARATOR) {
            Some(split_at) => Ok(Some(path[..split_at].to_string())),
            None => Ok(Some(String::new())),
        }
    }

    /// Last segment of `path` (the whole of a single-segment path). Relative
    /// paths are rejected.
    pub fn context_name<'a>(&self, path: &'a str) -> Result<&'a str> {
        reject_relative(path)?;

        match path.rfind(SEPARATOR) {
            Some(split_at) => Ok(&path[split_at + 1..]),
            None => Ok(path),
        }
    }

    /// Compose a child path; the root parent contributes no separator.
    pub fn join(&self, parent: &str, name: &str) -> String {
        if parent.is_empty() {
            name.to_string()
        } else {
            format!("{}{}{}", parent, SEPARATOR, name)
        }
    }
}

impl Default for PathAlgebra {
    fn default() -> Self {
        Self::new(Arc::new(SegmentCache::default()))
    }
}

/// True iff `longer` is `shorter` plus at least one more segment.
fn extends_at_boundary(shorter: &str, longer: &str) -> bool {
    longer.len() > shorter.len()
        && longer.as_bytes()[shorter.len()] == SEPARATOR as u8
        && longer.starts_with(shorter)
}

fn reject_relative(path: &str) -> Result<()> {
    if path.starts_with(SEPARATOR) {
        return Err(RouteError::RelativePath(path.to_string()));
    }
    Ok(())
}
