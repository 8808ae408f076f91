//! Mask expansion against the live namespace.

use crate::error::{Result, RouteError};
use crate::namespace::{Namespace, NodeRef};
use crate::paths::{PathAlgebra, SEPARATOR, WILDCARD};
use std::sync::Arc;

/// Resolves wildcard masks into the concrete paths that currently exist.
pub struct MaskExpander {
    namespace: Arc<dyn Namespace>,
    algebra: Arc<PathAlgebra>,
}

impl MaskExpander {
    pub fn new(namespace: Arc<dyn Namespace>, algebra: Arc<PathAlgebra>) -> Self {
        Self { namespace, algebra }
    }

    /// Concrete paths matching `mask`, in pre-order, left to right.
    ///
    /// A literal mask expands to itself when it resolves; an unresolved
    /// prefix yields no matches rather than an error. The result is stable
    /// across calls while the namespace is unchanged.
    pub fn expand(&self, mask: &str) -> Vec<String> {
        self.expand_mode(mask, false)
    }

    /// Like [`expand`](Self::expand), but wildcards enumerate each node's
    /// visible children. A visible child whose own path differs from the
    /// parent-plus-name composition is an indirection; expansion follows the
    /// child's real path.
    pub fn expand_visible(&self, mask: &str) -> Vec<String> {
        self.expand_mode(mask, true)
    }

    fn expand_mode(&self, mask: &str, visible: bool) -> Vec<String> {
        if !self.algebra.is_mask(mask) {
            return match self.namespace.resolve(mask) {
                Some(_) => vec![mask.to_string()],
                None => Vec::new(),
            };
        }

        let segments = self.algebra.split(mask);
        let wildcard_at = match segments.iter().position(|segment| segment == WILDCARD) {
            Some(index) => index,
            // A wildcard inside a segment is not expandable; nothing matches.
            None => return Vec::new(),
        };

        let separator = SEPARATOR.to_string();
        let head = segments[..wildcard_at].join(separator.as_str());
        let tail = if wildcard_at + 1 < segments.len() {
            format!(
                "{}{}",
                SEPARATOR,
                segments[wildcard_at + 1..].join(separator.as_str())
            )
        } else {
            String::new()
        };

        let node = match self.namespace.resolve(&head) {
            Some(node) => node,
            None => return Vec::new(),
        };

        if self.namespace.is_mapped(&node) {
            // Mapped containers are a terminal expansion: member paths as
            // they are, no tail recursion.
            return self
                .namespace
                .mapped_children(&node)
                .iter()
                .map(|member| member.path().to_string())
                .collect();
        }

        let children = if visible {
            self.namespace.visible_children(&node)
        } else {
            self.namespace.children(&node)
        };

        let mut expanded = Vec::new();
        for child in children {
            let direct = self.algebra.join(&head, child.name());
            let next = if visible && child.path() != direct {
                format!("{}{}", child.path(), tail)
            } else {
                format!("{}{}", direct, tail)
            };
            expanded.extend(self.expand_mode(&next, visible));
        }
        expanded
    }

    /// Paths under `roots_mask` whose type derives from `type_filter`,
    /// collected in pre-order.
    ///
    /// `resolve_groups` descends through mapped containers' members instead
    /// of ordinary children. A failed visit aborts the search with
    /// [`RouteError::Traversal`]; nothing collected so far is returned.
    pub fn find_subtree(
        &self,
        roots_mask: &str,
        type_filter: &str,
        resolve_groups: bool,
    ) -> Result<Vec<String>> {
        let mut found = Vec::new();

        for root_path in self.expand(roots_mask) {
            let root = match self.namespace.resolve(&root_path) {
                Some(root) => root,
                None => continue,
            };

            if resolve_groups {
                self.collect_resolving_groups(&root, type_filter, &mut found)?;
            } else {
                self.namespace
                    .visit(&root, &mut |node| {
                        if self.algebra.is_derived_from(node.type_name(), type_filter) {
                            found.push(node.path().to_string());
                        }
                        Ok(())
                    })
                    .map_err(|e| RouteError::Traversal(e.to_string()))?;
            }
        }

        Ok(found)
    }

    fn collect_resolving_groups(
        &self,
        node: &NodeRef,
        type_filter: &str,
        found: &mut Vec<String>,
    ) -> Result<()> {
        if self.algebra.is_derived_from(node.type_name(), type_filter) {
            found.push(node.path().to_string());
        }

        let descend = if self.namespace.is_mapped(node) {
            self.namespace.mapped_children(node)
        } else {
            self.namespace.children(node)
        };

        for child in descend {
            self.collect_resolving_groups(&child, type_filter, found)?;
        }
        Ok(())
    }
}
