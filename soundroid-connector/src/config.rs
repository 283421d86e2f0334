//! Timeouts for the protocol exchanges
//!
//! Every reply wait is bounded. Most replies get [`ConnectorConfig::response_timeout`];
//! the volume query, which a UI polls, gets the shorter
//! [`ConnectorConfig::volume_timeout`].

use std::time::Duration;

use soundroid_transport::TransportConfig;

/// Default bound on waiting for a reply
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(50);

/// Default bound on waiting for the current volume
pub const DEFAULT_VOLUME_TIMEOUT: Duration = Duration::from_secs(5);

const RESPONSE_TIMEOUT_ENV: &str = "SOUNDROID_RESPONSE_TIMEOUT_SECS";
const VOLUME_TIMEOUT_ENV: &str = "SOUNDROID_VOLUME_TIMEOUT_SECS";
const IO_TIMEOUT_ENV: &str = "SOUNDROID_IO_TIMEOUT_SECS";

/// Configuration for a [`Connector`](crate::Connector)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorConfig {
    /// Wait for the reply to `hello`, `chg_vol`, `mute`/`unmute` and `is_muted`
    /// Default: 50 seconds
    pub response_timeout: Duration,

    /// Wait for the reply to `get_vol`
    /// Default: 5 seconds
    pub volume_timeout: Duration,

    /// Settings handed to the transport
    /// Default: see [`TransportConfig`]
    pub transport: TransportConfig,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            volume_timeout: DEFAULT_VOLUME_TIMEOUT,
            transport: TransportConfig::default(),
        }
    }
}

impl ConnectorConfig {
    /// Create a new ConnectorConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Short timeouts for interactive front ends that would rather fail fast
    pub fn responsive() -> Self {
        Self {
            response_timeout: Duration::from_secs(5),
            volume_timeout: Duration::from_secs(2),
            transport: TransportConfig::new().with_io_timeout(Duration::from_secs(3)),
        }
    }

    /// Defaults, overridden by `SOUNDROID_RESPONSE_TIMEOUT_SECS`,
    /// `SOUNDROID_VOLUME_TIMEOUT_SECS` and `SOUNDROID_IO_TIMEOUT_SECS`.
    ///
    /// Values that are not a whole number of seconds are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let seconds = |key: &str| {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    tracing::warn!("Ignoring {}='{}': not a number of seconds", key, raw);
                    None
                }
            }
        };

        if let Some(timeout) = seconds(RESPONSE_TIMEOUT_ENV) {
            config.response_timeout = timeout;
        }
        if let Some(timeout) = seconds(VOLUME_TIMEOUT_ENV) {
            config.volume_timeout = timeout;
        }
        if let Some(timeout) = seconds(IO_TIMEOUT_ENV) {
            config.transport.io_timeout = timeout;
        }
        config
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_volume_timeout(mut self, timeout: Duration) -> Self {
        self.volume_timeout = timeout;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}
