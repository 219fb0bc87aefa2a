//! Error types for the reactive runtime.
//!
//! Most graph operations cannot fail: disposing twice or touching a node
//! that was already freed is a silent no-op. The errors below cover API
//! misuse that the caller can act on.

use thiserror::Error;

/// Result type for reactive operations.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Errors surfaced by the reactive runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    /// A computed was read while its own getter was running.
    #[error("cycle detected: computed {0} read itself while evaluating")]
    Cycle(String),

    /// `end_batch` was called without a matching `start_batch`.
    #[error("end_batch called outside of a batch")]
    UnbalancedBatch,

    /// `resume_tracking` was called without a matching `pause_tracking`.
    #[error("resume_tracking called without a matching pause_tracking")]
    UnbalancedResume,

    /// The node behind a handle no longer exists.
    #[error("reactive node {0} has been disposed")]
    Disposed(String),

    /// Configuration could not be parsed or failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for ReactiveError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
