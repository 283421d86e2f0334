//! Descriptors of the desktops a soundroid remote can talk to
//!
//! A [`HostAddress`] names one remote machine running the soundroid daemon: the
//! label given by the user, a transport-specific address and, for WiFi hosts,
//! the daemon's TCP port.
//!
//! ```
//! use soundroid_hosts::{AddressFamily, HostAddress};
//!
//! let host = HostAddress::from_line(AddressFamily::Ipv4, "office,192.168.1.20,5000")?;
//! assert_eq!(host.address_segments(), vec!["192", "168", "1", "20"]);
//! assert_eq!(host.to_string(), "office,192.168.1.20,5000");
//! # Ok::<(), soundroid_hosts::HostError>(())
//! ```

mod error;
mod host;

pub use error::{HostError, Result};
pub use host::{AddressFamily, HostAddress, HARDWARE_SEGMENTS, IPV4_SEGMENTS};
