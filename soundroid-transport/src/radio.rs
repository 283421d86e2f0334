//! RFCOMM transport for desktops reached over Bluetooth
//!
//! The radio itself sits behind [`RadioAdapter`]; this module only knows how to
//! pick a paired device and which channel the daemon listens on.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use soundroid_hosts::HostAddress;

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::{Inbound, Interrupt, Transport, TransportKind, LINE_TERMINATOR};

/// A device bonded with the local adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedDevice {
    /// Advertised device name
    pub name: String,
    /// Hardware address, e.g. "00:1A:7D:DA:71:13"
    pub address: String,
}

impl PairedDevice {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// The halves of an open radio channel
pub struct RadioLink {
    pub inbound: Box<dyn Read + Send>,
    pub outbound: Box<dyn Write + Send>,
    /// Unblocks a read parked on `inbound`; also used to tear the link down
    pub interrupt: Arc<dyn Interrupt>,
}

impl fmt::Debug for RadioLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RadioLink").finish_non_exhaustive()
    }
}

/// The platform's Bluetooth radio
pub trait RadioAdapter: Send + Sync {
    /// Whether the radio is present and switched on
    fn is_enabled(&self) -> bool;

    /// Devices currently bonded with this adapter
    fn paired_devices(&self) -> io::Result<Vec<PairedDevice>>;

    /// Open an unauthenticated RFCOMM channel to `device` on `channel`
    fn open_insecure_channel(&self, device: &PairedDevice, channel: u8) -> io::Result<RadioLink>;
}

/// An RFCOMM channel to a paired desktop.
///
/// The channel delivers bytes in chunks with no line framing, so replies are
/// not read here: after [`Transport::connect`] the inbound half is handed out
/// through [`Transport::take_inbound`] for a [`ResponseReader`](crate::ResponseReader).
pub struct RadioTransport {
    adapter: Arc<dyn RadioAdapter>,
    config: TransportConfig,
    paired: Vec<PairedDevice>,
    outbound: Option<Box<dyn Write + Send>>,
    inbound: Option<Inbound>,
    interrupt: Option<Arc<dyn Interrupt>>,
    connected: Option<PairedDevice>,
}

impl RadioTransport {
    pub fn new(adapter: Arc<dyn RadioAdapter>) -> Self {
        Self::with_config(adapter, TransportConfig::default())
    }

    pub fn with_config(adapter: Arc<dyn RadioAdapter>, config: TransportConfig) -> Self {
        let mut transport = Self {
            adapter,
            config,
            paired: Vec::new(),
            outbound: None,
            inbound: None,
            interrupt: None,
            connected: None,
        };
        transport.refresh_paired_devices();
        transport
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Re-read the adapter's bonded devices
    pub fn refresh_paired_devices(&mut self) {
        match self.adapter.paired_devices() {
            Ok(devices) => {
                if devices.is_empty() {
                    tracing::warn!("No paired devices has found!");
                }
                self.paired = devices;
            }
            Err(e) => {
                tracing::error!("Can't list the paired devices: {}", e);
                self.paired.clear();
            }
        }
    }

    pub fn paired_devices(&self) -> &[PairedDevice] {
        &self.paired
    }

    /// Every paired device as a Bluetooth host descriptor.
    ///
    /// Devices whose name or address cannot form a valid descriptor are skipped.
    pub fn paired_hosts(&self) -> Vec<HostAddress> {
        self.paired
            .iter()
            .filter_map(|device| {
                HostAddress::bluetooth(device.name.as_str(), device.address.as_str())
                    .map_err(|e| tracing::warn!("Skipping paired device '{}': {}", device.name, e))
                    .ok()
            })
            .collect()
    }

    /// Hardware address of the paired device called `name`, spaces removed.
    ///
    /// Empty when no paired device has that name.
    pub fn device_address_by_name(&self, name: &str) -> String {
        self.paired
            .iter()
            .find(|device| device.name == name)
            .map(|device| device.address.replace(' ', ""))
            .unwrap_or_default()
    }

    /// The device of the open channel
    pub fn connected_device(&self) -> Option<&PairedDevice> {
        self.connected.as_ref()
    }

    /// Match by advertised name first, then by hardware address
    fn find_device(&self, target: &str) -> Option<PairedDevice> {
        let wanted = target.replace(' ', "");
        self.paired
            .iter()
            .find(|device| device.name == target)
            .or_else(|| {
                self.paired
                    .iter()
                    .find(|device| device.address.replace(' ', "").eq_ignore_ascii_case(&wanted))
            })
            .cloned()
    }
}

impl Transport for RadioTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Bluetooth
    }

    fn is_connected_to_network(&self) -> bool {
        self.adapter.is_enabled()
    }

    /// `address` names the paired device; `port` is not used
    fn connect(&mut self, address: &str, _port: &str) -> Result<()> {
        self.close();

        if self.find_device(address).is_none() {
            self.refresh_paired_devices();
        }
        let device = self
            .find_device(address)
            .ok_or_else(|| TransportError::NotFound(address.to_string()))?;

        let channel = self.config.radio_channel;
        tracing::debug!(
            "Opening insecure channel {} to {} ({})",
            channel,
            device.name,
            device.address
        );

        let link = self
            .adapter
            .open_insecure_channel(&device, channel)
            .map_err(|e| {
                TransportError::io(
                    format!("Can't open channel {} to '{}'", channel, device.name),
                    e,
                )
            })?;

        self.inbound = Some(Inbound::new(link.inbound, Arc::clone(&link.interrupt)));
        self.outbound = Some(link.outbound);
        self.interrupt = Some(link.interrupt);
        self.connected = Some(device);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.outbound.is_some()
    }

    fn is_address_reachable(&self, _address: &str) -> Result<bool> {
        Err(TransportError::Unsupported {
            operation: "is_address_reachable",
            kind: TransportKind::Bluetooth,
        })
    }

    fn send(&mut self, line: &str) -> Result<()> {
        let outbound = self
            .outbound
            .as_mut()
            .ok_or_else(|| TransportError::not_open(TransportKind::Bluetooth))?;

        tracing::debug!("Sending {}", line);
        outbound
            .write_all(format!("{}{}", line, LINE_TERMINATOR).as_bytes())
            .and_then(|()| outbound.flush())
            .map_err(|e| TransportError::io(format!("Can't send '{}'", line), e))
    }

    fn receive_line(&mut self) -> Result<String> {
        Err(TransportError::Unsupported {
            operation: "receive_line",
            kind: TransportKind::Bluetooth,
        })
    }

    fn take_inbound(&mut self) -> Option<Inbound> {
        self.inbound.take()
    }

    fn close(&mut self) {
        if self.outbound.is_none() && self.interrupt.is_none() {
            return;
        }
        tracing::debug!("Close bluetooth connection");

        if let Some(mut outbound) = self.outbound.take() {
            if let Err(e) = outbound.flush() {
                tracing::debug!("Can't flush the output stream: {}", e);
            }
        }
        self.inbound = None;
        if let Some(interrupt) = self.interrupt.take() {
            if let Err(e) = interrupt.interrupt() {
                if e.kind() != io::ErrorKind::NotConnected {
                    tracing::error!("Can't close the channel: {}", e);
                }
            }
        }
        self.connected = None;
    }
}

impl Drop for RadioTransport {
    fn drop(&mut self) {
        self.close();
    }
}
