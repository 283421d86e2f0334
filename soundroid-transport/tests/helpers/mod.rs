//! Loopback stand-ins for a desktop daemon and a Bluetooth radio

#![allow(dead_code)]

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use soundroid_transport::{PairedDevice, RadioAdapter, RadioLink};

/// What the fake daemon does with one received line
#[derive(Debug, Clone)]
pub enum Action {
    /// Write the text followed by "\n"
    Reply(String),
    /// Stay silent
    Ignore,
    /// Drop the connection
    HangUp,
}

pub fn reply(text: &str) -> Action {
    Action::Reply(text.to_string())
}

pub type Script = Arc<dyn Fn(&str) -> Action + Send + Sync>;

/// A daemon that accepts one connection on 127.0.0.1 and answers by script
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

    /// Answers `hello` with `hello` and every other line with `OK`
    pub fn friendly() -> Self {
        Self::spawn(|line| match line {
            "hello" => reply("hello"),
            _ => reply("OK"),
        })
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

/// A radio whose channels are TCP connections to scripted fake daemons
pub struct LoopbackRadio {
    enabled: bool,
    devices: Vec<PairedDevice>,
    script: Script,
    channels: Mutex<Vec<u8>>,
    daemons: Mutex<Vec<FakeDaemon>>,
}

impl LoopbackRadio {
    pub fn new(
        devices: Vec<PairedDevice>,
        script: impl Fn(&str) -> Action + Send + Sync + 'static,
    ) -> Self {
        Self {
            enabled: true,
            devices,
            script: Arc::new(script),
            channels: Mutex::new(Vec::new()),
            daemons: Mutex::new(Vec::new()),
        }
    }

    pub fn with_desk(script: impl Fn(&str) -> Action + Send + Sync + 'static) -> Self {
        Self::new(vec![PairedDevice::new("desk", "00:1A:7D:DA:71:13")], script)
    }

    pub fn disabled() -> Self {
        let mut radio = Self::new(Vec::new(), |_| Action::Ignore);
        radio.enabled = false;
        radio
    }

    /// Channel numbers requested so far
    pub fn channels(&self) -> Vec<u8> {
        self.channels.lock().unwrap().clone()
    }
}

impl RadioAdapter for LoopbackRadio {
    fn is_enabled(&self) -> bool {
        self.enabled
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
