//! Core error model.

use thiserror::Error;

/// Result type used across the core model.
pub type CoreResult<T> = Result<T, CoreError>;

/// Core-level error.
///
/// Keep this focused on deterministic model failures (bad policy, bad topic names,
/// unreadable headers). Transport concerns belong to the log and engine crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A retry policy failed validation.
    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),

    /// A topic name or subject was unusable.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    /// A required wire header was absent.
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// A wire header was present but could not be parsed.
    #[error("invalid header {name}: {value:?}")]
    InvalidHeader { name: &'static str, value: String },
}

impl CoreError {
    pub fn invalid_policy(msg: impl Into<String>) -> Self {
        Self::InvalidPolicy(msg.into())
    }

    pub fn invalid_topic(msg: impl Into<String>) -> Self {
        Self::InvalidTopic(msg.into())
    }

    pub fn invalid_header(name: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidHeader {
            name,
            value: value.into(),
        }
    }
}
