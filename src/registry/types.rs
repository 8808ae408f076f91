//! Listener handles and subscription sets.

use crate::types::{EventEnvelope, ListenerId};
use std::sync::{Arc, Weak};

/// Receives events delivered by the router.
pub trait EventListener: Send + Sync {
    /// Per-listener filter consulted before scheduling and delivery.
    fn should_handle(&self, _event: &EventEnvelope) -> bool {
        true
    }

    /// Handle one delivered event.
    fn on_event(&self, event: &EventEnvelope);
}

/// Identity of a listener handle, as used by unsubscribe calls.
pub fn listener_id(listener: &Arc<dyn EventListener>) -> ListenerId {
    ListenerId(Arc::as_ptr(listener) as *const () as usize)
}

/// Strong or weak handle to a listener.
///
/// Identity comes from the allocation behind the handle, so the same
/// listener object always carries the same [`ListenerId`] no matter how many
/// handles to it exist, and a dead weak handle still answers with the
/// identity it had.
#[derive(Clone)]
pub enum ListenerRef {
    Strong(Arc<dyn EventListener>),
    Weak(Weak<dyn EventListener>),
}

impl ListenerRef {
    /// Identity of the referenced listener.
    pub fn id(&self) -> ListenerId {
        let data = match self {
            ListenerRef::Strong(listener) => Arc::as_ptr(listener) as *const (),
            ListenerRef::Weak(weak) => Weak::as_ptr(weak) as *const (),
        };
        ListenerId(data as usize)
    }

    /// Strong handle, when the listener is still alive.
    pub fn upgrade(&self) -> Option<Arc<dyn EventListener>> {
        match self {
            ListenerRef::Strong(listener) => Some(Arc::clone(listener)),
            ListenerRef::Weak(weak) => weak.upgrade(),
        }
    }
}

/// One registered listener under a (target, event-or-mask) pair.
#[derive(Clone)]
pub struct Subscription {
    listener: ListenerRef,
}

impl Subscription {
    /// Subscription keeping the listener alive.
    pub fn strong(listener: Arc<dyn EventListener>) -> Self {
        Self {
            listener: ListenerRef::Strong(listener),
        }
    }

    /// Subscription that does not keep the listener alive; it becomes dead
    /// once every outside strong handle is dropped.
    pub fn weak(listener: &Arc<dyn EventListener>) -> Self {
        Self {
            listener: ListenerRef::Weak(Arc::downgrade(listener)),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.listener.id()
    }

    pub fn is_weak(&self) -> bool {
        matches!(self.listener, ListenerRef::Weak(_))
    }

    /// True while delivery to this subscription is still possible.
    pub fn is_alive(&self) -> bool {
        match &self.listener {
            ListenerRef::Strong(_) => true,
            ListenerRef::Weak(weak) => weak.strong_count() > 0,
        }
    }

    /// The listener itself, when alive.
    pub fn listener(&self) -> Option<Arc<dyn EventListener>> {
        self.listener.upgrade()
    }
}

/// Insertion-ordered set of subscriptions, deduplicated by listener
/// identity.
#[derive(Clone, Default)]
pub struct SubscriptionSet {
    entries: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription unless its identity is already present; reports
    /// whether it was added.
    pub fn insert(&mut self, subscription: Subscription) -> bool {
        let id = subscription.id();
        if self.contains(id) {
            return false;
        }
        self.entries.push(subscription);
        true
    }

    /// Remove by identity; reports whether an entry was removed.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id() != id);
        self.entries.len() != before
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|entry| entry.id() == id)
    }

    /// Drop entries whose weak listener is gone; returns how many went.
    pub fn sweep_dead(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.is_alive());
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.iter()
    }

    /// Owned copy in registration order, for iteration outside locks.
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.entries.clone()
    }
}
