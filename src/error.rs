//! Error types for marsiya-review.

use thiserror::Error;

/// Result type for marsiya-review operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for marsiya-review operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// An addressed document, line, or entity does not exist.
    #[error("Missing state: {0}")]
    MissingState(String),

    /// A mutation would break the tagged/original text equivalence.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The span is already covered by an existing tag.
    #[error("Already tagged: {0}")]
    AlreadyTagged(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An external judge call failed or returned unusable output.
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a missing-state error.
    pub fn missing_state(msg: impl Into<String>) -> Self {
        Error::MissingState(msg.into())
    }

    /// Create an invariant-violation error.
    pub fn invariant(msg: impl Into<String>) -> Self {
        Error::InvariantViolation(msg.into())
    }

    /// Create an already-tagged refusal.
    pub fn already_tagged(msg: impl Into<String>) -> Self {
        Error::AlreadyTagged(msg.into())
    }

    /// Create an invalid-input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an upstream-failure error.
    pub fn upstream(msg: impl Into<String>) -> Self {
        Error::Upstream(msg.into())
    }
}
