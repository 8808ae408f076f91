//! Shipped in-memory context tree.

use crate::error::{Result, RouteError};
use crate::namespace::{ContextNode, Namespace, NodeRef};
use crate::paths::PathAlgebra;
use crate::types::EventDefinition;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// One context held by a [`ContextTree`].
struct TreeNode {
    path: String,
    name: String,
    type_name: String,
    mapped: bool,
    events: RwLock<Vec<EventDefinition>>,
    children: RwLock<Vec<Arc<TreeNode>>>,
    mapped_members: RwLock<Vec<Arc<TreeNode>>>,
}

impl TreeNode {
    fn new(
        path: String,
        name: String,
        type_name: String,
        mapped: bool,
        members: Vec<Arc<TreeNode>>,
    ) -> Self {
        Self {
            path,
            name,
            type_name,
            mapped,
            events: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
            mapped_members: RwLock::new(members),
        }
    }
}

impl ContextNode for TreeNode {
    fn path(&self) -> &str {
        &self.path
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn events(&self) -> Vec<EventDefinition> {
        self.events.read().clone()
    }

    fn event(&self, name: &str) -> Option<EventDefinition> {
        self.events.read().iter().find(|def| def.name == name).cloned()
    }
}

/// In-memory [`Namespace`] with a path index.
///
/// The root context (path `""`, type `root`) always exists. Children keep
/// insertion order. Mapped containers aggregate member nodes that live
/// elsewhere in the tree.
pub struct ContextTree {
    algebra: Arc<PathAlgebra>,
    nodes: RwLock<HashMap<String, Arc<TreeNode>>>,
}

impl ContextTree {
    /// Empty tree holding only the root context.
    pub fn new(algebra: Arc<PathAlgebra>) -> Self {
        let root = Arc::new(TreeNode::new(
            String::new(),
            String::new(),
            "root".to_string(),
            false,
            Vec::new(),
        ));

        let mut nodes = HashMap::new();
        nodes.insert(String::new(), root);

        Self {
            algebra,
            nodes: RwLock::new(nodes),
        }
    }

    /// Insert a plain context. The parent must already exist.
    pub fn insert(&self, path: &str, type_name: &str) -> Result<NodeRef> {
        self.insert_node(path, type_name, false, &[])
    }

    /// Insert a mapped container aggregating the given member nodes, each of
    /// which must already exist.
    pub fn insert_mapped(
        &self,
        path: &str,
        type_name: &str,
        member_paths: &[&str],
    ) -> Result<NodeRef> {
        self.insert_node(path, type_name, true, member_paths)
    }

    fn insert_node(
        &self,
        path: &str,
        type_name: &str,
        mapped: bool,
        member_paths: &[&str],
    ) -> Result<NodeRef> {
        let parent_path = match self.algebra.parent_path(path)? {
            Some(parent) => parent,
            None => return Err(RouteError::ContextExists(path.to_string())),
        };
        let name = self.algebra.context_name(path)?.to_string();
        if name.is_empty() {
            return Err(RouteError::InvalidOperation(format!(
                "empty context name in '{}'",
                path
            )));
        }
        // A name outside the segment charset could never be addressed again;
        // a name of `*` would collide with masks throughout.
        if !word_segment(&name) {
            return Err(RouteError::InvalidOperation(format!(
                "context name '{}' contains characters outside [A-Za-z0-9_]",
                name
            )));
        }

        let mut nodes = self.nodes.write();

        if nodes.contains_key(path) {
            return Err(RouteError::ContextExists(path.to_string()));
        }
        let parent = nodes
            .get(&parent_path)
            .cloned()
            .ok_or_else(|| RouteError::ParentMissing(path.to_string()))?;

        let members = member_paths
            .iter()
            .map(|member| {
                nodes
                    .get(*member)
                    .cloned()
                    .ok_or_else(|| RouteError::UnknownContext(member.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let node = Arc::new(TreeNode::new(
            path.to_string(),
            name,
            type_name.to_string(),
            mapped,
            members,
        ));

        parent.children.write().push(Arc::clone(&node));
        nodes.insert(path.to_string(), Arc::clone(&node));

        Ok(node)
    }

    /// Detach `path` and its whole subtree, returning the removed node.
    ///
    /// Callers that keep per-path state (the listener registry) must run
    /// their removal hooks before this, while the subtree still resolves.
    /// Mapped containers listing a removed member keep the stale entry.
    pub fn remove(&self, path: &str) -> Result<NodeRef> {
        let parent_path = match self.algebra.parent_path(path)? {
            Some(parent) => parent,
            None => {
                return Err(RouteError::InvalidOperation(
                    "the root context cannot be removed".to_string(),
                ))
            }
        };

        let mut nodes = self.nodes.write();
        let node = nodes
            .remove(path)
            .ok_or_else(|| RouteError::UnknownContext(path.to_string()))?;

        if let Some(parent) = nodes.get(&parent_path) {
            parent
                .children
                .write()
                .retain(|child| !Arc::ptr_eq(child, &node));
        }

        // Unindex the subtree; detached nodes keep their own child lists.
        let mut stack: Vec<Arc<TreeNode>> = node.children.read().clone();
        while let Some(current) = stack.pop() {
            nodes.remove(&current.path);
            stack.extend(current.children.read().iter().cloned());
        }

        Ok(node)
    }

    /// Declare (or redefine) an event on the context at `path`.
    pub fn declare_event(&self, path: &str, definition: EventDefinition) -> Result<NodeRef> {
        if !word_segment(&definition.name) {
            return Err(RouteError::InvalidOperation(format!(
                "event name '{}' is not a word-character segment",
                definition.name
            )));
        }

        let node = self
            .lookup(path)
            .ok_or_else(|| RouteError::UnknownContext(path.to_string()))?;

        {
            let mut events = node.events.write();
            match events.iter_mut().find(|def| def.name == definition.name) {
                Some(existing) => *existing = definition,
                None => events.push(definition),
            }
        }

        Ok(node)
    }

    /// Number of live contexts, the root included.
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    fn lookup(&self, path: &str) -> Option<Arc<TreeNode>> {
        self.nodes.read().get(path).cloned()
    }
}

fn word_segment(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn as_refs(children: &[Arc<TreeNode>]) -> Vec<NodeRef> {
    let mut refs: Vec<NodeRef> = Vec::with_capacity(children.len());
    for child in children {
        refs.push(child.clone());
    }
    refs
}

impl Namespace for ContextTree {
    fn resolve(&self, path: &str) -> Option<NodeRef> {
        let node = self.lookup(path)?;
        Some(node)
    }

    fn children(&self, node: &NodeRef) -> Vec<NodeRef> {
        match self.lookup(node.path()) {
            Some(found) => as_refs(&found.children.read()),
            None => Vec::new(),
        }
    }

    fn mapped_children(&self, node: &NodeRef) -> Vec<NodeRef> {
        match self.lookup(node.path()) {
            Some(found) => as_refs(&found.mapped_members.read()),
            None => Vec::new(),
        }
    }

    fn is_mapped(&self, node: &NodeRef) -> bool {
        self.lookup(node.path()).map(|found| found.mapped).unwrap_or(false)
    }
}
