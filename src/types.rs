//! Core types for the routing core.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a fired event occurrence.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a registered listener.
///
/// Derived from the listener's allocation, not its value: the same callback
/// object registered twice compares equal, two distinct objects with
/// identical behavior do not.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub usize);

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({:#x})", self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// How occurrences of an event are handed to listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcurrencyMode {
    /// Hand off to the bounded dispatch queue (default).
    Queued,
    /// Deliver inline on the firing thread, in registration order.
    Synchronous,
}

impl Default for ConcurrencyMode {
    fn default() -> Self {
        ConcurrencyMode::Queued
    }
}

/// A named event a context declares it can fire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefinition {
    /// Event name (a single word-character segment, e.g. "updated").
    pub name: String,

    /// Delivery mode for occurrences of this event.
    pub concurrency: ConcurrencyMode,
}

impl EventDefinition {
    /// Declare a queued event.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            concurrency: ConcurrencyMode::Queued,
        }
    }

    /// Declare a synchronously delivered event.
    pub fn synchronous(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            concurrency: ConcurrencyMode::Synchronous,
        }
    }
}

/// Opaque payload attached to one event occurrence.
///
/// The routing core never inspects the value; encoding and schema belong to
/// the layers above.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventData {
    /// Application-defined payload.
    pub value: serde_json::Value,

    /// Who fired the event, when known (for audit trails).
    pub originator: Option<String>,
}

impl EventData {
    /// Payload-less event data.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap a JSON payload.
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            value,
            originator: None,
        }
    }

    /// Attach an originator.
    pub fn with_originator(mut self, originator: impl Into<String>) -> Self {
        self.originator = Some(originator.into());
        self
    }
}

/// One event occurrence, as seen by listeners and the dispatch queue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Occurrence identifier (assigned by the dispatcher).
    pub id: EventId,

    /// Path of the context that fired.
    pub path: String,

    /// Declared event name.
    pub event: String,

    /// Opaque payload.
    pub data: EventData,

    /// When the event was fired.
    pub timestamp: Timestamp,
}

/// Point-in-time dispatch counters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Events handed to the queue collaborator.
    pub events_scheduled: u64,

    /// Events fully handled (inline delivery or short-circuit included).
    pub events_processed: u64,

    /// Events currently waiting in the queue.
    pub queue_length: usize,

    /// Per-event-name count of queued occurrences.
    pub per_event_queued: HashMap<String, u64>,
}

/// Point-in-time router statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RouterStats {
    /// Distinct context paths holding live bindings.
    pub exact_targets: usize,

    /// Distinct masks ever subscribed.
    pub mask_targets: usize,

    /// Distinct unresolved literal paths ever subscribed.
    pub univocal_targets: usize,

    /// Dispatch counters.
    pub dispatch: DispatchStats,
}
