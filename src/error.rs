// Error taxonomy for the knowledge-graph engine.
//
// Leaf operations (storage backends, indices) return `anyhow::Result` the
// way the teacher's contracts/wrappers layers do; the manager-facing
// surface translates those into this closed taxonomy so callers can match
// on error *kind* instead of parsing messages.

use thiserror::Error;

/// Result alias used by the public manager surface.
pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    /// Entity or relation absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Appending an entity whose name already exists (append-log backend only;
    /// the SQL backend resolves this via INSERT OR REPLACE and never raises it).
    #[error("duplicate entity: {0}")]
    Duplicate(String),

    /// Schema or range violation on input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A hierarchy operation would introduce a cycle in `parentId` chains.
    #[error("cycle detected: setting parent of '{child}' to '{parent}' would create a cycle")]
    Cycle { child: String, parent: String },

    /// Cooperative cancellation requested mid-operation.
    #[error("operation cancelled")]
    Cancelled,

    /// I/O failure, serialization failure, or a SQL error surfaced verbatim.
    #[error("storage error: {0}")]
    Storage(String),

    /// An operation needs at least N entities to proceed (e.g. compression/similarity).
    #[error("insufficient data: need at least {needed}, have {have}")]
    Insufficient { needed: usize, have: usize },
}

impl GraphError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::Duplicate(name.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

impl From<anyhow::Error> for GraphError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for GraphError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<std::io::Error> for GraphError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
