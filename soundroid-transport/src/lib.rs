//! Byte-stream transports between a soundroid remote and its desktop
//!
//! Two interchangeable transports implement the [`Transport`] capability set:
//!
//! - [`SocketTransport`]: a TCP stream to `address:port` (WiFi). Replies are
//!   read synchronously, one line per [`Transport::receive_line`] call.
//! - [`RadioTransport`]: an insecure RFCOMM channel to a paired device
//!   (Bluetooth). The channel only delivers byte chunks, so its inbound half is
//!   handed to a [`ResponseReader`] thread that rebuilds lines in the background.
//!
//! The platform radio is reached through the [`RadioAdapter`] trait. With the
//! `bluez` feature enabled, [`BluezAdapter`] provides a BlueZ-backed adapter.

mod config;
mod error;
mod radio;
mod reader;
mod socket;

#[cfg(feature = "bluez")]
mod bluez;

use std::fmt;
use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

pub use config::{TransportConfig, DEFAULT_IO_TIMEOUT, DEFAULT_RADIO_CHANNEL};
pub use error::{Result, TransportError};
pub use radio::{PairedDevice, RadioAdapter, RadioLink, RadioTransport};
pub use reader::{ResponseReader, RECEIVE_BUFFER_SIZE};
pub use socket::SocketTransport;

#[cfg(feature = "bluez")]
pub use bluez::BluezAdapter;

/// Terminator appended to every outgoing command line
pub const LINE_TERMINATOR: &str = "\n";

/// The network a transport runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Wifi,
    Bluetooth,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Wifi => write!(f, "wifi"),
            TransportKind::Bluetooth => write!(f, "bluetooth"),
        }
    }
}

/// Unblocks a reader parked on a channel's inbound half
pub trait Interrupt: Send + Sync {
    /// Make any pending or future read on the channel return promptly
    fn interrupt(&self) -> io::Result<()>;
}

impl Interrupt for TcpStream {
    fn interrupt(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

/// The inbound half of an open channel, detached for a [`ResponseReader`]
pub struct Inbound {
    stream: Box<dyn Read + Send>,
    interrupt: Arc<dyn Interrupt>,
}

impl Inbound {
    pub fn new(stream: Box<dyn Read + Send>, interrupt: Arc<dyn Interrupt>) -> Self {
        Self { stream, interrupt }
    }

    pub(crate) fn into_parts(self) -> (Box<dyn Read + Send>, Arc<dyn Interrupt>) {
        (self.stream, self.interrupt)
    }
}

impl fmt::Debug for Inbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbound").finish_non_exhaustive()
    }
}

/// A bidirectional text channel to one desktop.
///
/// Implementations keep their family-specific rules (address resolution,
/// channel numbers, reachability support) to themselves; callers only see this
/// capability set.
pub trait Transport: Send {
    /// Which network this transport runs over
    fn kind(&self) -> TransportKind;

    /// Whether the underlying network or radio is enabled at all
    fn is_connected_to_network(&self) -> bool;

    /// Open a channel to `address` (and `port`, where the transport uses one).
    ///
    /// Any channel opened earlier is closed first. On failure nothing is left open.
    fn connect(&mut self, address: &str, port: &str) -> Result<()>;

    /// Whether a channel is currently open
    fn is_open(&self) -> bool;

    /// Best-effort liveness probe of `address`.
    ///
    /// Returns `Ok(false)` on any I/O failure; transports that cannot probe
    /// fail with [`TransportError::Unsupported`].
    fn is_address_reachable(&self, address: &str) -> Result<bool>;

    /// Write `line` followed by [`LINE_TERMINATOR`] and flush
    fn send(&mut self, line: &str) -> Result<()>;

    /// Block for the next complete line, without its terminator.
    ///
    /// Chunk-oriented transports fail with [`TransportError::Unsupported`];
    /// their replies are collected through [`Transport::take_inbound`].
    fn receive_line(&mut self) -> Result<String>;

    /// Like [`Transport::receive_line`], but blocks for at most `limit`
    /// (never longer than the transport's own I/O timeout). Transports
    /// without a finer read timeout fall back to `receive_line`.
    fn receive_line_within(&mut self, _limit: Duration) -> Result<String> {
        self.receive_line()
    }

    /// Detach the inbound half for a background [`ResponseReader`].
    ///
    /// Returns `None` for line-oriented transports and once the half has
    /// already been taken.
    fn take_inbound(&mut self) -> Option<Inbound>;

    /// Drop inbound data nobody asked for yet, e.g. a reply that arrived
    /// after its request had timed out. Transports whose inbound half was
    /// handed out have nothing to discard.
    fn discard_pending(&mut self) {}

    /// Close every open sub-stream. Idempotent; failures are logged, not returned.
    fn close(&mut self);
}
