//! Transport tuning knobs

use std::time::Duration;

/// Connect, read and reachability timeout used when nothing else is configured
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// RFCOMM channel the soundroid daemon listens on
pub const DEFAULT_RADIO_CHANNEL: u8 = 11;

/// Configuration shared by the socket and radio transports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Bound for socket connect, socket reads and reachability probes
    /// Default: 10 seconds
    pub io_timeout: Duration,

    /// RFCOMM channel opened by the radio transport
    /// Default: 11
    pub radio_channel: u8,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            io_timeout: DEFAULT_IO_TIMEOUT,
            radio_channel: DEFAULT_RADIO_CHANNEL,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn with_radio_channel(mut self, channel: u8) -> Self {
        self.radio_channel = channel;
        self
    }
}
