//! TCP transport for desktops reached over WiFi

use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::{Inbound, Transport, TransportKind, LINE_TERMINATOR};

/// Port probed by [`SocketTransport::is_address_reachable`] (TCP echo)
const ECHO_PORT: u16 = 7;

/// Shortest read timeout handed to the OS; zero means "block forever" there
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Documentation-range address used to ask the OS for a route; nothing is sent
const ROUTE_PROBE: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);

/// A TCP stream to the daemon's `address:port`.
///
/// Reads are synchronous: [`Transport::receive_line`] blocks the caller for at
/// most [`TransportConfig::io_timeout`]. Bytes of a line cut off by a read
/// timeout are kept and completed by the next read.
pub struct SocketTransport {
    config: TransportConfig,
    stream: Option<TcpStream>,
    reader: Option<BufReader<TcpStream>>,
    partial: Vec<u8>,
    peer: String,
}

impl SocketTransport {
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Self {
        Self {
            config,
            stream: None,
            reader: None,
            partial: Vec::new(),
            peer: String::new(),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// `address:port` of the open stream, empty when closed
    pub fn peer(&self) -> &str {
        &self.peer
    }

    fn open(&self, address: &str, port: &str) -> Result<TcpStream> {
        let port: u16 = port.trim().parse().map_err(|_| {
            TransportError::connection(format!("The port '{}' is not a number", port))
        })?;

        let candidates = (address, port).to_socket_addrs().map_err(|e| {
            TransportError::io(format!("Can't resolve {}:{}", address, port), e)
        })?;

        let mut last_error = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, self.config.io_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::debug!("Connecting to {} failed: {}", candidate, e);
                    last_error = Some(e);
                }
            }
        }

        let source = last_error
            .unwrap_or_else(|| io::Error::new(ErrorKind::NotFound, "no addresses resolved"));
        Err(TransportError::io(
            format!("Can't connect to {}:{}", address, port),
            source,
        ))
    }

    fn configure(&self, stream: &TcpStream) -> io::Result<BufReader<TcpStream>> {
        stream.set_read_timeout(Some(self.config.io_timeout))?;
        stream.set_write_timeout(Some(self.config.io_timeout))?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Can't disable Nagle: {}", e);
        }
        Ok(BufReader::new(stream.try_clone()?))
    }
}

impl Default for SocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Wifi
    }

    fn is_connected_to_network(&self) -> bool {
        match local_route() {
            Ok(Some(ip)) => {
                tracing::trace!("Local address {} has a route out", ip);
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::debug!("No usable network: {}", e);
                false
            }
        }
    }

    fn connect(&mut self, address: &str, port: &str) -> Result<()> {
        self.close();
        tracing::debug!("Init socket to address: {} with the port: {}", address, port);

        let stream = self.open(address, port)?;
        let reader = self.configure(&stream).map_err(|e| {
            TransportError::io(format!("Can't configure the socket to {}", address), e)
        })?;

        self.stream = Some(stream);
        self.reader = Some(reader);
        self.peer = format!("{}:{}", address, port.trim());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn is_address_reachable(&self, address: &str) -> Result<bool> {
        let ip = match resolve_ip(address) {
            Ok(ip) => ip,
            Err(e) => {
                tracing::debug!("In is_address_reachable(): {}", e);
                return Ok(false);
            }
        };

        let target = SocketAddr::new(ip, ECHO_PORT);
        match TcpStream::connect_timeout(&target, self.config.io_timeout) {
            Ok(_) => Ok(true),
            // a refusal still proves the host answered
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => Ok(true),
            Err(e) => {
                tracing::debug!("In is_address_reachable(): {}", e);
                Ok(false)
            }
        }
    }

    fn send(&mut self, line: &str) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::not_open(TransportKind::Wifi))?;

        tracing::debug!("Sending '{}' by socket", line);
        stream
            .write_all(format!("{}{}", line, LINE_TERMINATOR).as_bytes())
            .and_then(|()| stream.flush())
            .map_err(|e| TransportError::io(format!("Can't send '{}'", line), e))
    }

    fn receive_line(&mut self) -> Result<String> {
        self.receive_line_within(self.config.io_timeout)
    }

    fn receive_line_within(&mut self, limit: Duration) -> Result<String> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| TransportError::not_open(TransportKind::Wifi))?;

        let timeout = limit.min(self.config.io_timeout).max(MIN_READ_TIMEOUT);
        reader
            .get_ref()
            .set_read_timeout(Some(timeout))
            .map_err(|e| TransportError::io("Can't set the read timeout", e))?;

        // read_until keeps what it got before an error in `partial`
        let read = reader
            .read_until(b'\n', &mut self.partial)
            .map_err(|e| TransportError::io("Can't receive a line", e))?;
        if read == 0 {
            self.partial.clear();
            return Err(TransportError::connection("The connection was closed by the peer"));
        }

        let raw = std::mem::take(&mut self.partial);
        let line = String::from_utf8_lossy(&raw)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        tracing::debug!("The received string is '{}'", line);
        Ok(line)
    }

    fn take_inbound(&mut self) -> Option<Inbound> {
        None
    }

    fn discard_pending(&mut self) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };

        let buffered = reader.buffer().len();
        reader.consume(buffered);
        let mut stale = buffered + self.partial.len();
        self.partial.clear();

        if let Err(e) = reader.get_ref().set_nonblocking(true) {
            tracing::debug!("Can't switch the socket to non-blocking: {}", e);
            return;
        }
        let mut scratch = [0u8; 256];
        loop {
            match reader.get_mut().read(&mut scratch) {
                Ok(0) | Err(_) => break,
                Ok(bytes) => stale += bytes,
            }
        }
        if let Err(e) = reader.get_ref().set_nonblocking(false) {
            tracing::error!("Can't switch the socket back to blocking: {}", e);
        }

        if stale > 0 {
            tracing::debug!("Discarded {} bytes of unsolicited data", stale);
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            tracing::debug!("Close connection to {}", self.peer);
            if let Err(e) = stream.shutdown(std::net::Shutdown::Both) {
                if e.kind() != ErrorKind::NotConnected {
                    tracing::error!("Can't close socket: {}", e);
                }
            }
        }
        self.reader = None;
        self.partial.clear();
        self.peer.clear();
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn resolve_ip(address: &str) -> io::Result<IpAddr> {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(ip);
    }
    (address, 0)
        .to_socket_addrs()?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| io::Error::new(ErrorKind::NotFound, format!("can't resolve {}", address)))
}

/// The local address the OS would use to leave the machine, if any
fn local_route() -> io::Result<Option<IpAddr>> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect((ROUTE_PROBE, 9))?;
    let ip = socket.local_addr()?.ip();
    Ok((!ip.is_unspecified() && !ip.is_loopback()).then_some(ip))
}
