//! Error types for the connector

use soundroid_hosts::HostError;
use soundroid_transport::TransportError;
use thiserror::Error;

/// Errors surfaced by [`Connector`](crate::Connector).
///
/// Only connection set-up, the handshake and reachability probes return
/// errors. Steady-state operations log their failures and fall back to an
/// empty or `false` result.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The transport could not be opened, written or probed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A host descriptor was rejected
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Convenience Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;
