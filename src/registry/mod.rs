//! Subscription registry: listener types and the binding lifecycle.

mod manager;
mod types;

pub use manager::ListenerRegistry;
pub use types::{listener_id, EventListener, ListenerRef, Subscription, SubscriptionSet};
