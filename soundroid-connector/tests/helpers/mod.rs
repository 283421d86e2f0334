//! Scripted transports and daemons for connector tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use soundroid_connector::{
    ConnectorConfig, Inbound, PairedDevice, RadioAdapter, RadioLink, Transport, TransportConfig,
    TransportError, TransportKind,
};

/// What the far end does with one received line
#[derive(Debug, Clone)]
pub enum Action {
    /// Answer with the text; "\n" separates several lines
    Reply(String),
    Ignore,
    HangUp,
}

pub fn reply(text: &str) -> Action {
    Action::Reply(text.to_string())
}

pub type Script = Arc<dyn Fn(&str) -> Action + Send + Sync>;

/// Timeouts short enough for tests that wait them out
pub fn quick_config() -> ConnectorConfig {
    ConnectorConfig::new()
        .with_response_timeout(Duration::from_millis(300))
        .with_volume_timeout(Duration::from_millis(150))
        .with_transport(TransportConfig::new().with_io_timeout(Duration::from_millis(50)))
}

// ============================================================================
// In-memory transport
// ============================================================================

/// Everything a [`MockTransport`] saw
#[derive(Debug, Default)]
pub struct MockLog {
    pub connects: Vec<(String, String)>,
    pub sent: Vec<String>,
    pub closes: usize,
    pub discarded: Vec<String>,
    pub open: bool,
}

pub type LogHandle = Arc<Mutex<MockLog>>;

/// A line-oriented transport answering from a script
pub struct MockTransport {
    log: Arc<Mutex<MockLog>>,
    script: Script,
    pending: VecDeque<String>,
    hung_up: bool,
    refuse_connect: bool,
    poll: Duration,
}

impl MockTransport {
    pub fn new(
        script: impl Fn(&str) -> Action + Send + Sync + 'static,
    ) -> (Self, LogHandle) {
        let log = Arc::new(Mutex::new(MockLog::default()));
        let transport = Self {
            log: Arc::clone(&log),
            script: Arc::new(script),
            pending: VecDeque::new(),
            hung_up: false,
            refuse_connect: false,
            poll: Duration::from_millis(20),
        };
        (transport, log)
    }

    pub fn refusing() -> (Self, LogHandle) {
        let (mut transport, log) = Self::new(|_| Action::Ignore);
        transport.refuse_connect = true;
        (transport, log)
    }

    fn failure(reason: &str, kind: Option<io::ErrorKind>) -> TransportError {
        TransportError::Connection {
            reason: reason.to_string(),
            source: kind.map(io::Error::from),
        }
    }
}

impl Transport for MockTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Wifi
    }

    fn is_connected_to_network(&self) -> bool {
        true
    }

    fn connect(&mut self, address: &str, port: &str) -> Result<(), TransportError> {
        let mut log = self.log.lock().unwrap();
        log.connects.push((address.to_string(), port.to_string()));
        if self.refuse_connect {
            return Err(Self::failure("refused", Some(io::ErrorKind::ConnectionRefused)));
        }
        log.open = true;
        self.hung_up = false;
        self.pending.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.log.lock().unwrap().open
    }

    fn is_address_reachable(&self, address: &str) -> Result<bool, TransportError> {
        Ok(address == "127.0.0.1")
    }

    fn send(&mut self, line: &str) -> Result<(), TransportError> {
        let mut log = self.log.lock().unwrap();
        if !log.open || self.hung_up {
            return Err(Self::failure("not open", Some(io::ErrorKind::NotConnected)));
        }
        log.sent.push(line.to_string());

        match (self.script)(line) {
            Action::Reply(text) => self.pending.extend(text.split('\n').map(str::to_string)),
            Action::Ignore => {}
            Action::HangUp => self.hung_up = true,
        }
        Ok(())
    }

    fn receive_line(&mut self) -> Result<String, TransportError> {
        if let Some(line) = self.pending.pop_front() {
            return Ok(line);
        }
        if self.hung_up {
            return Err(Self::failure("closed by peer", None));
        }
        thread::sleep(self.poll);
        Err(Self::failure("read timed out", Some(io::ErrorKind::WouldBlock)))
    }

    fn take_inbound(&mut self) -> Option<Inbound> {
        None
    }

    fn discard_pending(&mut self) {
        let stale: Vec<String> = self.pending.drain(..).collect();
        self.log.lock().unwrap().discarded.extend(stale);
    }

    fn close(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.open = false;
        log.closes += 1;
        self.pending.clear();
    }
}

// ============================================================================
// Loopback daemon
// ============================================================================

/// A daemon that accepts one TCP connection on 127.0.0.1 and answers by script
pub struct FakeDaemon {
    port: u16,
    handle: Option<JoinHandle<Vec<String>>>,
}

impl FakeDaemon {
    pub fn spawn(script: impl Fn(&str) -> Action + Send + Sync + 'static) -> Self {
        Self::spawn_script(Arc::new(script))
    }

    pub fn spawn_script(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake daemon");
        let port = listener.local_addr().expect("local addr").port();

        let handle = thread::spawn(move || match listener.accept() {
            Ok((stream, _)) => serve(stream, script.as_ref()),
            Err(_) => Vec::new(),
        });

        Self {
            port,
            handle: Some(handle),
        }
    }

    /// Volume 42, unmuted, accepts every change
    pub fn desktop() -> Self {
        Self::spawn(daemon_script)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn port_string(&self) -> String {
        self.port.to_string()
    }

    /// Lines received before the client went away. Blocks until it does.
    pub fn received(mut self) -> Vec<String> {
        self.handle
            .take()
            .map(|handle| handle.join().expect("fake daemon panicked"))
            .unwrap_or_default()
    }
}

/// Answers like the real daemon with volume 42, unmuted
pub fn daemon_script(line: &str) -> Action {
    match line {
        "hello" => reply("hello"),
        "get_vol" => reply("42"),
        "is_muted" => reply("false"),
        "mute" | "unmute" => reply("OK"),
        _ if line.starts_with("chg_vol ") => reply("OK"),
        _ => reply("ERR"),
    }
}

fn serve(stream: TcpStream, script: &(dyn Fn(&str) -> Action + Send + Sync)) -> Vec<String> {
    let mut received = Vec::new();
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(_) => return received,
    };

    for line in BufReader::new(stream).lines() {
        let Ok(line) = line else { break };
        let line = line.trim_end_matches('\r').to_string();
        let action = script(&line);
        received.push(line);

        match action {
            Action::Reply(text) => {
                if writer.write_all(format!("{}\n", text).as_bytes()).is_err() {
                    break;
                }
            }
            Action::Ignore => {}
            Action::HangUp => {
                let _ = writer.shutdown(std::net::Shutdown::Both);
                break;
            }
        }
    }
    received
}

// ============================================================================
// Loopback radio
// ============================================================================

/// A radio whose channels are TCP connections to scripted fake daemons
pub struct LoopbackRadio {
    devices: Vec<PairedDevice>,
    script: Script,
    channels: Mutex<Vec<u8>>,
    daemons: Mutex<Vec<FakeDaemon>>,
}

impl LoopbackRadio {
    pub fn with_desk(script: impl Fn(&str) -> Action + Send + Sync + 'static) -> Self {
        Self {
            devices: vec![PairedDevice::new("desk", "00:1A:7D:DA:71:13")],
            script: Arc::new(script),
            channels: Mutex::new(Vec::new()),
            daemons: Mutex::new(Vec::new()),
        }
    }

    pub fn channels(&self) -> Vec<u8> {
        self.channels.lock().unwrap().clone()
    }
}

impl RadioAdapter for LoopbackRadio {
    fn is_enabled(&self) -> bool {
        true
    }

    fn paired_devices(&self) -> io::Result<Vec<PairedDevice>> {
        Ok(self.devices.clone())
    }

    fn open_insecure_channel(&self, _device: &PairedDevice, channel: u8) -> io::Result<RadioLink> {
        self.channels.lock().unwrap().push(channel);

        let daemon = FakeDaemon::spawn_script(Arc::clone(&self.script));
        let stream = TcpStream::connect(("127.0.0.1", daemon.port()))?;
        self.daemons.lock().unwrap().push(daemon);

        Ok(RadioLink {
            inbound: Box::new(stream.try_clone()?),
            outbound: Box::new(stream.try_clone()?),
            interrupt: Arc::new(stream),
        })
    }
}
