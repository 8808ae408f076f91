//! The assembled routing core behind one handle.

use crate::dispatch::{DispatchOrchestrator, EventQueue, ThreadedEventQueue};
use crate::error::{Result, RouteError};
use crate::namespace::{ContextTree, MaskExpander, Namespace, NodeRef};
use crate::paths::{PathAlgebra, SegmentCache, DEFAULT_SEGMENT_CACHE_SIZE};
use crate::registry::{EventListener, ListenerRegistry};
use crate::types::{EventData, EventDefinition, EventId, ListenerId, RouterStats};
use std::sync::Arc;

/// Tuning knobs for a [`Router`].
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Capacity of the shared path-segment cache.
    pub segment_cache_size: usize,

    /// Capacity of the asynchronous dispatch queue.
    pub queue_capacity: usize,

    /// Worker threads consuming the dispatch queue.
    pub workers: usize,

    /// Deliver every event inline instead of queueing.
    pub synchronous: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            segment_cache_size: DEFAULT_SEGMENT_CACHE_SIZE,
            queue_capacity: 1024,
            workers: 1,
            synchronous: false,
        }
    }
}

/// Event router over an in-memory context tree.
///
/// Composes the path algebra, the namespace, the mask expander, the
/// subscription registry and the dispatch layer, and keeps the registry in
/// step with every namespace mutation made through this handle.
pub struct Router {
    tree: Arc<ContextTree>,
    expander: Arc<MaskExpander>,
    registry: Arc<ListenerRegistry>,
    dispatch: DispatchOrchestrator,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        let cache = Arc::new(SegmentCache::new(config.segment_cache_size));
        let algebra = Arc::new(PathAlgebra::new(cache));
        let tree = Arc::new(ContextTree::new(Arc::clone(&algebra)));
        let namespace: Arc<dyn Namespace> = tree.clone();
        let expander = Arc::new(MaskExpander::new(
            Arc::clone(&namespace),
            Arc::clone(&algebra),
        ));
        let registry = Arc::new(ListenerRegistry::new(algebra, namespace, Arc::clone(&expander)));
        let queue: Arc<dyn EventQueue> =
            Arc::new(ThreadedEventQueue::new(config.queue_capacity, config.workers));
        let dispatch =
            DispatchOrchestrator::new(Arc::clone(&registry), queue, config.synchronous);

        Self {
            tree,
            expander,
            registry,
            dispatch,
        }
    }

    // --- Namespace operations ---

    /// Create a context under an existing parent.
    pub fn add_context(&self, path: &str, type_name: &str) -> Result<NodeRef> {
        let node = self.tree.insert(path, type_name)?;
        self.registry.on_node_added(&node);
        Ok(node)
    }

    /// Create a mapped container aggregating already existing members.
    pub fn add_mapped_context(
        &self,
        path: &str,
        type_name: &str,
        member_paths: &[&str],
    ) -> Result<NodeRef> {
        let node = self.tree.insert_mapped(path, type_name, member_paths)?;
        self.registry.on_node_added(&node);
        Ok(node)
    }

    /// Remove a context and its whole subtree. Live bindings below it are
    /// dropped; mask and univocal subscriptions survive for rebinding.
    pub fn remove_context(&self, path: &str) -> Result<()> {
        let node = self
            .tree
            .resolve(path)
            .ok_or_else(|| RouteError::UnknownContext(path.to_string()))?;

        // Unbinding walks the subtree, so it has to run before detachment.
        self.registry.on_node_removed(&node)?;
        self.tree.remove(path)?;
        Ok(())
    }

    /// Declare (or redeclare) an event on a context and bind any parked
    /// subscriptions that were waiting for it.
    pub fn declare_event(&self, path: &str, definition: EventDefinition) -> Result<()> {
        let node = self.tree.declare_event(path, definition.clone())?;
        self.registry.on_event_declared(&node, &definition);
        Ok(())
    }

    /// Node at `path`, if one is live.
    pub fn resolve(&self, path: &str) -> Option<NodeRef> {
        self.tree.resolve(path)
    }

    // --- Subscription operations ---

    /// Subscribe to `event_or_mask` on a concrete path or a wildcard mask.
    /// Unresolved targets are kept and bind when a match appears.
    pub fn subscribe(&self, target: &str, event_or_mask: &str, listener: Arc<dyn EventListener>) {
        self.registry.subscribe(target, event_or_mask, listener);
    }

    /// Subscribe without keeping the listener alive.
    pub fn subscribe_weak(
        &self,
        target: &str,
        event_or_mask: &str,
        listener: &Arc<dyn EventListener>,
    ) {
        self.registry.subscribe_weak(target, event_or_mask, listener);
    }

    /// Drop a listener from `(target, event_or_mask)` and its live bindings.
    pub fn unsubscribe(&self, target: &str, event_or_mask: &str, listener: ListenerId) {
        self.registry.unsubscribe(target, event_or_mask, listener);
    }

    /// Drop subscriptions whose weak listener has been deallocated. Returns
    /// how many entries went away.
    pub fn sweep_dead_weak_listeners(&self) -> usize {
        self.registry.sweep_dead_weak_listeners()
    }

    // --- Event operations ---

    /// Fire a declared event on a live context.
    pub fn fire(&self, path: &str, event: &str, data: EventData) -> Result<EventId> {
        let node = self
            .tree
            .resolve(path)
            .ok_or_else(|| RouteError::UnknownContext(path.to_string()))?;
        self.dispatch.fire(&node, event, data)
    }

    // --- Queries ---

    /// Concrete live paths matched by `mask`.
    pub fn expand(&self, mask: &str) -> Vec<String> {
        self.expander.expand(mask)
    }

    /// Like [`expand`](Self::expand), over visible children.
    pub fn expand_visible(&self, mask: &str) -> Vec<String> {
        self.expander.expand_visible(mask)
    }

    /// Paths under the contexts matched by `roots_mask` whose type derives
    /// from `type_filter`.
    pub fn find_subtree(
        &self,
        roots_mask: &str,
        type_filter: &str,
        resolve_groups: bool,
    ) -> Result<Vec<String>> {
        self.expander.find_subtree(roots_mask, type_filter, resolve_groups)
    }

    // --- Lifecycle ---

    /// Start asynchronous delivery; events fired beforehand flow first.
    pub fn start(&self) -> Result<()> {
        self.dispatch.start()
    }

    /// Stop asynchronous delivery after draining the queue.
    pub fn stop(&self) {
        self.dispatch.stop();
    }

    pub fn is_running(&self) -> bool {
        self.dispatch.is_running()
    }

    pub fn stats(&self) -> RouterStats {
        let (exact_targets, mask_targets, univocal_targets) = self.registry.table_sizes();
        RouterStats {
            exact_targets,
            mask_targets,
            univocal_targets,
            dispatch: self.dispatch.stats(),
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}
