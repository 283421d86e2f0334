//! Error types for host descriptors

use thiserror::Error;

/// Errors that can occur while building or editing a [`HostAddress`](crate::HostAddress)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// A required field is missing or a field has the wrong shape
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl HostError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Convenience Result type alias for host operations.
pub type Result<T> = std::result::Result<T, HostError>;
