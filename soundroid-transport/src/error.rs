//! Error types for transports

use std::io;

use thiserror::Error;

use crate::TransportKind;

/// Errors that can occur while opening or using a transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// The channel could not be opened, written or read
    #[error("Connection error: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },

    /// No paired radio device matches the requested name
    #[error("There is no paired device with the name: {0}")]
    NotFound(String),

    /// The operation has no meaning for this transport
    #[error("{operation} is not supported by the {kind} transport")]
    Unsupported {
        operation: &'static str,
        kind: TransportKind,
    },
}

impl TransportError {
    pub(crate) fn connection(reason: impl Into<String>) -> Self {
        Self::Connection {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn io(reason: impl Into<String>, source: io::Error) -> Self {
        Self::Connection {
            reason: reason.into(),
            source: Some(source),
        }
    }

    pub(crate) fn not_open(kind: TransportKind) -> Self {
        Self::connection(format!("the {} channel is not open", kind))
    }

    /// Whether the failure was a read or write running into its timeout
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Connection {
                source: Some(e), ..
            } => matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut),
            _ => false,
        }
    }
}

/// Convenience Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
