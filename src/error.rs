//! Error types for the routing core.

use thiserror::Error;

/// Main error type for routing operations.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Relative path not allowed here: {0}")]
    RelativePath(String),

    #[error("Context not found: {0}")]
    UnknownContext(String),

    #[error("Event '{event}' not declared by context '{path}'")]
    UnknownEvent { path: String, event: String },

    #[error("Context already exists: {0}")]
    ContextExists(String),

    #[error("Parent context missing for: {0}")]
    ParentMissing(String),

    #[error("Subtree traversal failed: {0}")]
    Traversal(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Event queue is full")]
    QueueFull,

    #[error("Event queue is not running")]
    QueueStopped,

    #[error("Internal inconsistency: {0}")]
    Internal(String),
}

/// Result type for routing operations.
pub type Result<T> = std::result::Result<T, RouteError>;
