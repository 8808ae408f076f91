//! The live context namespace the routing core reads.
//!
//! The core never owns nodes; it consumes them through the [`ContextNode`]
//! and [`Namespace`] traits and keys its own state by path strings. The
//! shipped in-memory implementation is [`ContextTree`].

mod expand;
mod tree;

pub use expand::MaskExpander;
pub use tree::ContextTree;

use crate::error::Result;
use crate::types::EventDefinition;
use std::sync::Arc;

/// Shared handle to one namespace node.
pub type NodeRef = Arc<dyn ContextNode>;

/// Read-only view of a single context.
pub trait ContextNode: Send + Sync {
    /// Absolute dot-separated path.
    fn path(&self) -> &str;

    /// Last path segment (empty for the root).
    fn name(&self) -> &str;

    /// Dot-segmented type name, consumed by type-filtered searches.
    fn type_name(&self) -> &str;

    /// Events the context currently declares.
    fn events(&self) -> Vec<EventDefinition>;

    /// Declared event by exact name.
    fn event(&self, name: &str) -> Option<EventDefinition> {
        self.events().into_iter().find(|def| def.name == name)
    }
}

/// A live tree of contexts.
///
/// The routing core only reads the namespace; mutation stays with the
/// implementation behind this trait.
pub trait Namespace: Send + Sync {
    /// Node at `path`, if one is live.
    fn resolve(&self, path: &str) -> Option<NodeRef>;

    /// Ordinary children of `node`, in insertion order.
    fn children(&self, node: &NodeRef) -> Vec<NodeRef>;

    /// Members aggregated by a mapped container (empty for plain nodes).
    fn mapped_children(&self, node: &NodeRef) -> Vec<NodeRef>;

    /// True for containers whose children are a computed view.
    fn is_mapped(&self, node: &NodeRef) -> bool;

    /// Children as presented to visibility-aware expansion. Entries whose
    /// own path differs from the parent-plus-name composition are treated
    /// as indirections by the expander.
    fn visible_children(&self, node: &NodeRef) -> Vec<NodeRef> {
        self.children(node)
    }

    /// Pre-order walk of `node`'s subtree; the first visitor error aborts
    /// the walk and propagates.
    fn visit(
        &self,
        node: &NodeRef,
        visitor: &mut dyn FnMut(&NodeRef) -> Result<()>,
    ) -> Result<()> {
        visitor(node)?;
        for child in self.children(node) {
            self.visit(&child, visitor)?;
        }
        Ok(())
    }
}
