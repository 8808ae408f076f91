//! # Canopy
//!
//! A live, tree-shaped namespace of addressable contexts with wildcard
//! event routing and retroactive subscriptions.
//!
//! ## Core Concepts
//!
//! - **Paths**: Dot-separated addresses where `*` stands for one whole segment
//! - **Contexts**: Namespace nodes that declare the events they can fire
//! - **Subscriptions**: Bind eagerly and survive namespace churn, rebinding
//!   when a matching context reappears
//! - **Dispatch**: Inline synchronous delivery, or a bounded queue with its
//!   own worker pool
//!
//! ## Example
//!
//! ```ignore
//! use canopy::{EventData, EventDefinition, Router, RouterConfig};
//!
//! let router = Router::new(RouterConfig::default());
//! router.add_context("home", "area")?;
//! router.add_context("home.hall", "area")?;
//! router.declare_event("home.hall", EventDefinition::new("motion"))?;
//!
//! // A mask subscription also covers contexts that appear later.
//! router.subscribe("home.*", "motion", listener);
//!
//! router.start()?;
//! router.fire("home.hall", "motion", EventData::empty())?;
//! ```

pub mod dispatch;
pub mod error;
pub mod namespace;
pub mod paths;
pub mod registry;
pub mod router;
pub mod types;

// Re-exports
pub use dispatch::{DispatchOrchestrator, EventHandler, EventQueue, ThreadedEventQueue};
pub use error::{Result, RouteError};
pub use namespace::{ContextNode, ContextTree, MaskExpander, Namespace, NodeRef};
pub use paths::{PathAlgebra, SegmentCache, DEFAULT_SEGMENT_CACHE_SIZE, SEPARATOR, WILDCARD};
pub use registry::{
    listener_id, EventListener, ListenerRef, ListenerRegistry, Subscription, SubscriptionSet,
};
pub use router::{Router, RouterConfig};
pub use types::*;
