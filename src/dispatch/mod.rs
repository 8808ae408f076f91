//! Event dispatch: the queue hand-off and the sync/async decision around it.

mod orchestrator;
mod queue;

pub use orchestrator::DispatchOrchestrator;
pub use queue::{EventHandler, EventQueue, ThreadedEventQueue};
