//! BlueZ-backed radio adapter (feature `bluez`)
//!
//! `bluer` is async, the transports are blocking. A private single-worker
//! tokio runtime owns the D-Bus session; the blocking halves of a link drive
//! their futures with `block_on` on that runtime.

use std::io::{self, Read, Write};
use std::sync::Arc;

use bluer::rfcomm::{Security, SecurityLevel, Socket, SocketAddr};
use bluer::{Adapter, Address, Session};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;

use crate::radio::{PairedDevice, RadioAdapter, RadioLink};
use crate::Interrupt;

fn to_io(e: bluer::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

/// The system's default Bluetooth adapter, reached over BlueZ
pub struct BluezAdapter {
    runtime: Arc<Runtime>,
    adapter: Adapter,
    // keeps the D-Bus connection alive
    _session: Session,
}

impl BluezAdapter {
    /// Connect to bluetoothd and pick the default adapter
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("soundroid-bluez")
            .enable_all()
            .build()?;

        let (session, adapter) = runtime.block_on(async {
            let session = Session::new().await.map_err(to_io)?;
            let adapter = session.default_adapter().await.map_err(to_io)?;
            Ok::<_, io::Error>((session, adapter))
        })?;

        tracing::debug!("Using bluetooth adapter {}", adapter.name());

        Ok(Self {
            runtime: Arc::new(runtime),
            adapter,
            _session: session,
        })
    }
}

impl RadioAdapter for BluezAdapter {
    fn is_enabled(&self) -> bool {
        match self.runtime.block_on(self.adapter.is_powered()) {
            Ok(powered) => powered,
            Err(e) => {
                tracing::debug!("Can't query the adapter power state: {}", e);
                false
            }
        }
    }

    fn paired_devices(&self) -> io::Result<Vec<PairedDevice>> {
        self.runtime.block_on(async {
            let mut paired = Vec::new();
            for address in self.adapter.device_addresses().await.map_err(to_io)? {
                let device = self.adapter.device(address).map_err(to_io)?;
                if !device.is_paired().await.map_err(to_io)? {
                    continue;
                }
                let name = device.name().await.map_err(to_io)?.unwrap_or_default();
                paired.push(PairedDevice::new(name, address.to_string()));
            }
            Ok(paired)
        })
    }

    fn open_insecure_channel(&self, device: &PairedDevice, channel: u8) -> io::Result<RadioLink> {
        let address: Address = device
            .address
            .replace(' ', "")
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let stream = self.runtime.block_on(async {
            let socket = Socket::new()?;
            socket.set_security(Security {
                level: SecurityLevel::Low,
                key_size: 0,
            })?;
            socket.connect(SocketAddr::new(address, channel)).await
        })?;

        let (read_half, write_half) = stream.into_split();
        let (cancel, cancelled) = watch::channel(false);

        Ok(RadioLink {
            inbound: Box::new(BlockingRead {
                runtime: Arc::clone(&self.runtime),
                half: read_half,
                cancelled,
            }),
            outbound: Box::new(BlockingWrite {
                runtime: Arc::clone(&self.runtime),
                half: write_half,
            }),
            interrupt: Arc::new(Cancel(cancel)),
        })
    }
}

struct BlockingRead {
    runtime: Arc<Runtime>,
    half: bluer::rfcomm::stream::OwnedReadHalf,
    cancelled: watch::Receiver<bool>,
}

impl Read for BlockingRead {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if *self.cancelled.borrow() {
            return Ok(0);
        }
        let Self {
            runtime,
            half,
            cancelled,
        } = self;
        runtime.block_on(async {
            tokio::select! {
                read = half.read(buf) => read,
                _ = cancelled.changed() => Ok(0),
            }
        })
    }
}

struct BlockingWrite {
    runtime: Arc<Runtime>,
    half: bluer::rfcomm::stream::OwnedWriteHalf,
}

impl Write for BlockingWrite {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.runtime.block_on(self.half.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.runtime.block_on(self.half.flush())
    }
}

/// Ends any read parked on the link
struct Cancel(watch::Sender<bool>);

impl Interrupt for Cancel {
    fn interrupt(&self) -> io::Result<()> {
        self.0.send_replace(true);
        Ok(())
    }
}
