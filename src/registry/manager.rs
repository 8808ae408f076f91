//! Three-table subscription registry with retroactive binding.
//!
//! Subscriptions live in `exact` (bindings on live contexts), `mask`
//! (wildcard targets, kept forever so later contexts can bind) and
//! `univocal` (wildcard-free targets that could not be fully bound when they
//! were registered). The namespace calls back into the registry as contexts
//! and events appear and disappear; binding is eager, so a context's
//! listeners are in place before its first event fires.
//!
//! Outer tables grow with the number of distinct targets ever subscribed
//! and are never pruned; that bound is a documented characteristic of the
//! design, not a leak.

use crate::error::{Result, RouteError};
use crate::namespace::{MaskExpander, Namespace, NodeRef};
use crate::paths::PathAlgebra;
use crate::registry::types::{EventListener, Subscription, SubscriptionSet};
use crate::types::{EventDefinition, EventEnvelope, ListenerId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-target map of event name (or event mask) to its subscription set.
type Bucket = Arc<Mutex<HashMap<String, SubscriptionSet>>>;

/// Outer table: target key to bucket. Buckets are created lazily and keep
/// their own lock so unrelated targets never serialize against each other.
type Table = RwLock<HashMap<String, Bucket>>;

/// Subscription tables plus the bind/unbind lifecycle.
pub struct ListenerRegistry {
    algebra: Arc<PathAlgebra>,
    namespace: Arc<dyn Namespace>,
    expander: Arc<MaskExpander>,
    exact: Table,
    mask: Table,
    univocal: Table,
}

impl ListenerRegistry {
    pub fn new(
        algebra: Arc<PathAlgebra>,
        namespace: Arc<dyn Namespace>,
        expander: Arc<MaskExpander>,
    ) -> Self {
        Self {
            algebra,
            namespace,
            expander,
            exact: RwLock::new(HashMap::new()),
            mask: RwLock::new(HashMap::new()),
            univocal: RwLock::new(HashMap::new()),
        }
    }

    // --- Subscribing ---

    /// Subscribe a listener to `event_or_mask` on `target` (a concrete path
    /// or a wildcard mask). Never fails: unresolved targets are parked and
    /// bind when a matching context appears.
    pub fn subscribe(&self, target: &str, event_or_mask: &str, listener: Arc<dyn EventListener>) {
        self.register(target, event_or_mask, Subscription::strong(listener));
    }

    /// Like [`subscribe`](Self::subscribe), without keeping the listener
    /// alive. Dead entries are dropped by
    /// [`sweep_dead_weak_listeners`](Self::sweep_dead_weak_listeners).
    pub fn subscribe_weak(
        &self,
        target: &str,
        event_or_mask: &str,
        listener: &Arc<dyn EventListener>,
    ) {
        self.register(target, event_or_mask, Subscription::weak(listener));
    }

    fn register(&self, target: &str, event_or_mask: &str, subscription: Subscription) {
        if self.algebra.is_mask(target) {
            // Remember the mask for contexts that appear later, then bind to
            // everything it matches right now.
            insert_into(&self.mask, target, event_or_mask, subscription.clone());

            for path in self.expander.expand(target) {
                if let Some(node) = self.namespace.resolve(&path) {
                    let bound = self.bind_node_events(&node, event_or_mask, &subscription);
                    if bound > 0 {
                        tracing::trace!("mask '{}' bound at '{}' for {} event(s)", target, path, bound);
                    }
                }
            }
            return;
        }

        let bound = match self.namespace.resolve(target) {
            Some(node) => self.bind_node_events(&node, event_or_mask, &subscription),
            None => 0,
        };

        if bound == 0 {
            // Context absent, or present without a matching declared event.
            tracing::trace!("parking univocal subscription for '{}'", target);
            insert_into(&self.univocal, target, event_or_mask, subscription);
        }
    }

    /// Remove a listener from `(target, event_or_mask)` wherever it is held,
    /// including the live bindings it produced.
    pub fn unsubscribe(&self, target: &str, event_or_mask: &str, listener: ListenerId) {
        if self.algebra.is_mask(target) {
            remove_from(&self.mask, target, event_or_mask, listener);
            for path in self.expander.expand(target) {
                self.unbind_node_events(&path, event_or_mask, listener);
            }
        } else {
            remove_from(&self.univocal, target, event_or_mask, listener);
            self.unbind_node_events(target, event_or_mask, listener);
        }
    }

    // --- Namespace lifecycle hooks ---

    /// A context became live: copy every matching mask and univocal listener
    /// into its bindings, for every declared event the stored event-or-mask
    /// matches.
    pub fn on_node_added(&self, node: &NodeRef) {
        let path = node.path();

        for (mask, stored) in self.masks_matching(path) {
            tracing::trace!("mask '{}' rebinding to new context '{}'", mask, path);
            self.bind_stored(node, &stored);
        }

        if let Some(stored) = bucket_for(&self.univocal, path) {
            tracing::trace!("univocal subscriptions rebinding to '{}'", path);
            self.bind_stored(node, &stored);
        }
    }

    /// A subtree is being removed: drop every visited context's bindings.
    /// Mask and univocal entries stay, so an equivalent path appearing later
    /// binds again. Call this while the subtree still resolves.
    pub fn on_node_removed(&self, node: &NodeRef) -> Result<()> {
        self.namespace
            .visit(node, &mut |visited| {
                if self.exact.write().remove(visited.path()).is_some() {
                    tracing::trace!("dropped bindings of removed context '{}'", visited.path());
                }
                Ok(())
            })
            .map_err(|e| RouteError::Traversal(e.to_string()))
    }

    /// A live context declared a new event: bind the stored listeners whose
    /// event-or-mask matches this one name.
    pub fn on_event_declared(&self, node: &NodeRef, definition: &EventDefinition) {
        let path = node.path();

        for (_, stored) in self.masks_matching(path) {
            self.bind_stored_to_event(&stored, path, &definition.name);
        }

        if let Some(stored) = bucket_for(&self.univocal, path) {
            self.bind_stored_to_event(&stored, path, &definition.name);
        }
    }

    // --- Maintenance and queries ---

    /// Drop every subscription whose weak listener is gone, across all three
    /// tables. Returns the number of entries dropped (one listener may
    /// account for several entries).
    pub fn sweep_dead_weak_listeners(&self) -> usize {
        sweep_table(&self.exact) + sweep_table(&self.mask) + sweep_table(&self.univocal)
    }

    /// Snapshot of the live bindings for `(path, event)`, in registration
    /// order.
    pub fn bound_listeners(&self, path: &str, event: &str) -> Vec<Subscription> {
        let bucket = match bucket_for(&self.exact, path) {
            Some(bucket) => bucket,
            None => return Vec::new(),
        };
        let events = bucket.lock();
        events.get(event).map(|set| set.snapshot()).unwrap_or_default()
    }

    /// Dispatch pre-filter: is there a live listener for `(path, event)`
    /// accepting `envelope`? Filters run on a snapshot, outside any registry
    /// lock.
    pub fn has_live_listener(&self, path: &str, event: &str, envelope: &EventEnvelope) -> bool {
        self.bound_listeners(path, event)
            .iter()
            .any(|subscription| match subscription.listener() {
                Some(listener) => listener.should_handle(envelope),
                None => false,
            })
    }

    /// Distinct target keys per table: `(exact, mask, univocal)`.
    pub fn table_sizes(&self) -> (usize, usize, usize) {
        (
            self.exact.read().len(),
            self.mask.read().len(),
            self.univocal.read().len(),
        )
    }

    // --- Binding internals ---

    /// Bind one subscription to every declared event of `node` matching
    /// `event_or_mask`; returns how many events matched.
    fn bind_node_events(
        &self,
        node: &NodeRef,
        event_or_mask: &str,
        subscription: &Subscription,
    ) -> usize {
        let matching: Vec<EventDefinition> = node
            .events()
            .into_iter()
            .filter(|def| self.algebra.matches(event_or_mask, &def.name, false, false))
            .collect();

        if matching.is_empty() {
            return 0;
        }

        let bucket = bucket_or_create(&self.exact, node.path());
        let mut events = bucket.lock();
        for def in &matching {
            events
                .entry(def.name.clone())
                .or_default()
                .insert(subscription.clone());
        }
        matching.len()
    }

    fn unbind_node_events(&self, path: &str, event_or_mask: &str, listener: ListenerId) {
        let bucket = match bucket_for(&self.exact, path) {
            Some(bucket) => bucket,
            None => return,
        };
        let mut events = bucket.lock();
        events.retain(|event_name, set| {
            if self.algebra.matches(event_or_mask, event_name, false, false) {
                set.remove(listener);
            }
            !set.is_empty()
        });
    }

    /// Bind everything held in `stored` to `node`'s matching events.
    fn bind_stored(&self, node: &NodeRef, stored: &Bucket) {
        for (event_or_mask, subscriptions) in stored_entries(stored) {
            for subscription in subscriptions {
                self.bind_node_events(node, &event_or_mask, &subscription);
            }
        }
    }

    /// Bind the subset of `stored` matching one newly declared event name.
    fn bind_stored_to_event(&self, stored: &Bucket, path: &str, event_name: &str) {
        for (event_or_mask, subscriptions) in stored_entries(stored) {
            if !self.algebra.matches(&event_or_mask, event_name, false, false) {
                continue;
            }

            let bucket = bucket_or_create(&self.exact, path);
            let mut events = bucket.lock();
            let set = events.entry(event_name.to_string()).or_default();
            for subscription in subscriptions {
                set.insert(subscription);
            }
        }
    }

    /// Stored masks matching `path` strictly (no extension flags).
    fn masks_matching(&self, path: &str) -> Vec<(String, Bucket)> {
        self.mask
            .read()
            .iter()
            .filter(|(mask, _)| self.algebra.matches(mask, path, false, false))
            .map(|(mask, bucket)| (mask.clone(), Arc::clone(bucket)))
            .collect()
    }
}

/// Existing bucket for `key`, if any.
fn bucket_for(table: &Table, key: &str) -> Option<Bucket> {
    table.read().get(key).cloned()
}

/// Bucket for `key`, created if absent. Double-checked: optimistic read,
/// then write lock and re-check before inserting.
fn bucket_or_create(table: &Table, key: &str) -> Bucket {
    if let Some(bucket) = table.read().get(key) {
        return Arc::clone(bucket);
    }

    let mut outer = table.write();
    Arc::clone(outer.entry(key.to_string()).or_default())
}

fn insert_into(table: &Table, target: &str, event_or_mask: &str, subscription: Subscription) {
    let bucket = bucket_or_create(table, target);
    let mut events = bucket.lock();
    events
        .entry(event_or_mask.to_string())
        .or_default()
        .insert(subscription);
}

fn remove_from(table: &Table, target: &str, event_or_mask: &str, listener: ListenerId) {
    let bucket = match bucket_for(table, target) {
        Some(bucket) => bucket,
        None => return,
    };
    let mut events = bucket.lock();
    if let Some(set) = events.get_mut(event_or_mask) {
        set.remove(listener);
        if set.is_empty() {
            events.remove(event_or_mask);
        }
    }
}

/// Owned snapshot of a bucket's entries; the bucket lock is released before
/// the snapshot is consumed.
fn stored_entries(bucket: &Bucket) -> Vec<(String, Vec<Subscription>)> {
    let events = bucket.lock();
    events
        .iter()
        .map(|(key, set)| (key.clone(), set.snapshot()))
        .collect()
}

fn sweep_table(table: &Table) -> usize {
    let buckets: Vec<Bucket> = table.read().values().cloned().collect();

    let mut removed = 0;
    for bucket in buckets {
        let mut events = bucket.lock();
        for set in events.values_mut() {
            removed += set.sweep_dead();
        }
        events.retain(|_, set| !set.is_empty());
    }
    removed
}
