//! Remote control of a desktop's audio volume
//!
//! A [`Connector`] owns one transport to a desktop running the soundroid
//! daemon and speaks its line protocol: a `hello` handshake, then volume
//! queries and changes, mute and unmute.
//!
//! ```rust,no_run
//! use soundroid_connector::{Connector, ConnectorConfig, HostAddress};
//!
//! let host = HostAddress::wifi("office", "192.168.1.20", "5000")?;
//! let mut connector = Connector::wifi(ConnectorConfig::default());
//!
//! connector.connect_to(&host)?;
//! if connector.hand_shake()? {
//!     println!("volume: {:?}", connector.current_volume());
//!     connector.send_chg_vol(-5);
//! }
//! connector.close_connection();
//! # Ok::<(), soundroid_connector::ConnectorError>(())
//! ```
//!
//! The host descriptor and transport types are re-exported, so front ends
//! only need this crate.

mod config;
mod connector;
mod error;
pub mod logging;
pub mod protocol;

pub use config::{ConnectorConfig, DEFAULT_RESPONSE_TIMEOUT, DEFAULT_VOLUME_TIMEOUT};
pub use connector::{ConnectionState, Connector};
pub use error::{ConnectorError, Result};
pub use protocol::{Command, Reply};

pub use soundroid_hosts::{AddressFamily, HostAddress, HostError};
pub use soundroid_transport::{
    Inbound, Interrupt, PairedDevice, RadioAdapter, RadioLink, RadioTransport, SocketTransport,
    Transport, TransportConfig, TransportError, TransportKind,
};

#[cfg(feature = "bluez")]
pub use soundroid_transport::BluezAdapter;
