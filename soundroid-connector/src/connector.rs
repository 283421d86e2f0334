//! One session with one desktop's daemon

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use soundroid_hosts::HostAddress;
use soundroid_transport::{
    RadioAdapter, RadioTransport, ResponseReader, SocketTransport, Transport, TransportKind,
};

use crate::config::ConnectorConfig;
use crate::error::Result;
use crate::protocol::{parse_volume, Command, Reply};

/// Where a [`Connector`] is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No channel open
    Disconnected,
    /// The channel is open but the daemon has not answered `hello`
    TransportOpen,
    /// The daemon answered `hello` since the channel was opened
    Handshaken,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::TransportOpen => write!(f, "transport open"),
            ConnectionState::Handshaken => write!(f, "handshaken"),
        }
    }
}

/// Drives the volume protocol over one [`Transport`].
///
/// Requests are strictly one at a time: every wire operation borrows the
/// connector mutably and returns only after its reply arrived or timed out.
/// Steady-state operations never fail; an I/O error or a timeout is logged and
/// turns into an empty string or `false`.
///
/// Dropping the connector closes the connection.
pub struct Connector {
    transport: Box<dyn Transport>,
    reader: Option<ResponseReader>,
    config: ConnectorConfig,
    state: ConnectionState,
    target: String,
}

impl Connector {
    pub fn new(transport: Box<dyn Transport>, config: ConnectorConfig) -> Self {
        Self {
            transport,
            reader: None,
            config,
            state: ConnectionState::Disconnected,
            target: String::new(),
        }
    }

    /// A connector over TCP
    pub fn wifi(config: ConnectorConfig) -> Self {
        let transport = SocketTransport::with_config(config.transport.clone());
        Self::new(Box::new(transport), config)
    }

    /// A connector over RFCOMM through `adapter`
    pub fn bluetooth(adapter: Arc<dyn RadioAdapter>, config: ConnectorConfig) -> Self {
        let transport = RadioTransport::with_config(adapter, config.transport.clone());
        Self::new(Box::new(transport), config)
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Open a channel to `address`/`port`.
    ///
    /// Closes any previous connection first. For Bluetooth `address` is the
    /// paired device's name and `port` is ignored. A transport that only
    /// delivers byte chunks gets a background [`ResponseReader`].
    pub fn connect(&mut self, address: &str, port: &str) -> Result<()> {
        self.close_connection();

        self.transport.connect(address, port)?;
        if let Some(inbound) = self.transport.take_inbound() {
            match ResponseReader::start(inbound) {
                Ok(reader) => self.reader = Some(reader),
                Err(e) => {
                    self.transport.close();
                    return Err(e.into());
                }
            }
        }

        self.target = address.to_string();
        self.set_state(ConnectionState::TransportOpen);
        Ok(())
    }

    /// Open a channel to `host`, by address and port or, for Bluetooth hosts,
    /// by device name
    pub fn connect_to(&mut self, host: &HostAddress) -> Result<()> {
        let (address, port) = host.endpoint();
        self.connect(address, port)?;
        self.target = host.name().to_string();
        Ok(())
    }

    /// Send `hello` and check the daemon answers in kind.
    ///
    /// Fails only when the request cannot be written. A wrong or missing reply
    /// returns `Ok(false)` and leaves the channel open for a retry.
    pub fn hand_shake(&mut self) -> Result<bool> {
        self.discard_stale();
        if let Err(e) = self.transport.send(&Command::Hello.to_string()) {
            self.drop_handshake();
            return Err(e.into());
        }

        let reply = self.await_reply(self.config.response_timeout);
        if Reply::parse(&reply) == Reply::Hello {
            self.set_state(ConnectionState::Handshaken);
            Ok(true)
        } else {
            tracing::error!("The daemon answered '{}' to hello", reply);
            self.drop_handshake();
            Ok(false)
        }
    }

    /// The current volume as the daemon wrote it, or an empty string
    pub fn get_cur_vol(&mut self) -> String {
        self.request(Command::GetVolume, self.config.volume_timeout)
    }

    /// The current volume in percent, if the daemon gave a valid one
    pub fn current_volume(&mut self) -> Option<u8> {
        let text = self.get_cur_vol();
        let volume = parse_volume(&text);
        if volume.is_none() && !text.is_empty() {
            tracing::warn!("The volume '{}' is not a percentage", text);
        }
        volume
    }

    /// Change the volume by `delta` percent; true iff the daemon answered `OK`
    pub fn send_chg_vol(&mut self, delta: i32) -> bool {
        let reply = self.request(Command::ChangeVolume(delta), self.config.response_timeout);
        Reply::parse(&reply) == Reply::Ok
    }

    /// Mute or unmute; true iff the daemon answered `OK`, in any case
    pub fn send_mute_state(&mut self, mute: bool) -> bool {
        let command = if mute { Command::Mute } else { Command::Unmute };
        let reply = self.request(command, self.config.response_timeout);
        let reply = reply.trim();
        match reply {
            "" => false,
            _ if reply.eq_ignore_ascii_case("OK") => true,
            _ if reply.eq_ignore_ascii_case("ERR") => {
                tracing::debug!("The daemon refused '{}'", command);
                false
            }
            _ => {
                tracing::warn!("Unknown response '{}' to '{}'", reply, command);
                false
            }
        }
    }

    /// Whether the daemon reports its output muted; false on any failure
    pub fn is_muted(&mut self) -> bool {
        let reply = self.request(Command::IsMuted, self.config.response_timeout);
        Reply::parse(&reply) == Reply::Flag(true)
    }

    /// Probe `address` through the transport, without any protocol traffic
    pub fn is_addr_reachable(&self, address: &str) -> Result<bool> {
        Ok(self.transport.is_address_reachable(address)?)
    }

    pub fn is_connected_to_daemon(&self) -> bool {
        self.state == ConnectionState::Handshaken
    }

    /// Whether the network or radio under the transport is enabled
    pub fn is_connected_to_network(&self) -> bool {
        self.transport.is_connected_to_network()
    }

    /// The host of the handshaken session, empty otherwise.
    ///
    /// This is the host's label after [`Connector::connect_to`] and the
    /// address given to [`Connector::connect`] otherwise.
    pub fn connected_host_name(&self) -> &str {
        if self.is_connected_to_daemon() {
            &self.target
        } else {
            ""
        }
    }

    /// Stop the reader, close the transport and forget the handshake.
    /// Safe to call in any state, any number of times.
    pub fn close_connection(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.stop();
        }
        self.transport.close();
        self.target.clear();
        self.set_state(ConnectionState::Disconnected);
    }

    /// Send `command` and wait up to `timeout` for its reply. Failures are
    /// logged and come back as an empty string.
    fn request(&mut self, command: Command, timeout: Duration) -> String {
        self.discard_stale();
        if let Err(e) = self.transport.send(&command.to_string()) {
            tracing::error!("Can't send '{}': {}", command, e);
            return String::new();
        }
        self.await_reply(timeout)
    }

    fn discard_stale(&mut self) {
        match &self.reader {
            Some(reader) => reader.clear(),
            None => self.transport.discard_pending(),
        }
    }

    fn await_reply(&mut self, timeout: Duration) -> String {
        if let Some(reader) = &self.reader {
            return reader.take_response(timeout);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                tracing::error!("Too long awaiting for response (> {:?})", timeout);
                return String::new();
            }
            match self.transport.receive_line_within(left) {
                Ok(line) => return line.trim().to_string(),
                Err(e) if e.is_timeout() => continue,
                Err(e) => {
                    tracing::error!("Can't receive the response: {}", e);
                    return String::new();
                }
            }
        }
    }

    fn drop_handshake(&mut self) {
        let state = if self.transport.is_open() {
            ConnectionState::TransportOpen
        } else {
            ConnectionState::Disconnected
        };
        self.set_state(state);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::debug!("Connector {} -> {}", self.state, state);
            self.state = state;
        }
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("kind", &self.transport.kind())
            .field("state", &self.state)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        self.close_connection();
    }
}
