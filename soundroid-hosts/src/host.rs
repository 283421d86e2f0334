//! The host descriptor and its validation rules

use std::fmt;

use crate::error::{HostError, Result};

/// Number of dotted parts in an IPv4 address
pub const IPV4_SEGMENTS: usize = 4;

/// Number of parts in a Bluetooth hardware address
pub const HARDWARE_SEGMENTS: usize = 6;

const FIELD_SEPARATOR: char = ',';

/// The kind of address a host is reached by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// Dotted-quad IPv4 address plus a TCP port (WiFi hosts)
    Ipv4,
    /// Colon or dash delimited hardware address (Bluetooth hosts)
    Hardware,
}

impl AddressFamily {
    /// Number of segments an address of this family splits into
    pub fn segment_count(self) -> usize {
        match self {
            AddressFamily::Ipv4 => IPV4_SEGMENTS,
            AddressFamily::Hardware => HARDWARE_SEGMENTS,
        }
    }

    /// Whether hosts of this family carry a port
    pub fn uses_port(self) -> bool {
        matches!(self, AddressFamily::Ipv4)
    }
}

/// A remote desktop running the soundroid daemon.
///
/// Values built through [`HostAddress::wifi`], [`HostAddress::bluetooth`] or
/// [`HostAddress::from_line`] are fully validated. [`HostAddress::empty`] gives
/// the "new entry" placeholder that [`HostAddress::is_empty`] recognises.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostAddress {
    family: AddressFamily,
    name: String,
    address: String,
    port: String,
}

impl HostAddress {
    /// Placeholder host with every field empty
    pub fn empty(family: AddressFamily) -> Self {
        Self {
            family,
            name: String::new(),
            address: String::new(),
            port: String::new(),
        }
    }

    /// Build a WiFi host from user input.
    ///
    /// Rejects an empty name, address or port, an address that is not four
    /// decimal octets in `0..=255`, and a port that is not a number.
    pub fn wifi(
        name: impl Into<String>,
        address: impl Into<String>,
        port: impl Into<String>,
    ) -> Result<Self> {
        let (name, address, port) = (name.into(), address.into(), port.into());

        require_field(&name, "desktop's name")?;
        require_field(&address, "desktop's address")?;
        require_field(&port, "desktop's port")?;
        check_text(&name, "name")?;
        check_ipv4(&address)?;
        check_port(&port)?;

        Ok(Self {
            family: AddressFamily::Ipv4,
            name,
            address,
            port,
        })
    }

    /// Build a Bluetooth host from a device name and its hardware address
    pub fn bluetooth(name: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        let (name, address) = (name.into(), address.into());

        require_field(&name, "bluetooth desktop name")?;
        require_field(&address, "bluetooth desktop address")?;
        check_text(&name, "name")?;
        check_hardware(&address)?;

        Ok(Self {
            family: AddressFamily::Hardware,
            name,
            address,
            port: String::new(),
        })
    }

    /// Parse a serialized `name,address[,port]` line.
    ///
    /// WiFi lines need all three fields. Bluetooth lines need two and accept
    /// whitespace around the commas. Fields beyond the expected ones are ignored.
    pub fn from_line(family: AddressFamily, line: &str) -> Result<Self> {
        if line.is_empty() {
            return Err(HostError::invalid("The given desktop's data string is empty"));
        }

        let fields: Vec<&str> = match family {
            AddressFamily::Ipv4 => line.split(FIELD_SEPARATOR).collect(),
            AddressFamily::Hardware => line.split(FIELD_SEPARATOR).map(str::trim).collect(),
        };

        let field = |index: usize, what: &str| {
            fields.get(index).copied().ok_or_else(|| {
                HostError::invalid(format!(
                    "The given desktop's data string '{}' doesn't contain the desktop's {}",
                    line, what
                ))
            })
        };

        match family {
            AddressFamily::Ipv4 => {
                let name = field(0, "name")?;
                let address = field(1, "IP")?;
                let port = field(2, "port")?;
                Self::wifi(name, address, port)
            }
            AddressFamily::Hardware => {
                let name = field(0, "name")?;
                let address = field(1, "MAC address")?;
                Self::bluetooth(name, address)
            }
        }
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// The daemon's port; always empty for Bluetooth hosts
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Replace the user label.
    ///
    /// Fails when the value contains a field separator or a line break, which
    /// would corrupt the serialized form.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        check_text(&name, "name")?;
        self.name = name;
        Ok(())
    }

    pub fn set_address(&mut self, address: impl Into<String>) -> Result<()> {
        let address = address.into();
        check_text(&address, "address")?;
        self.address = address;
        Ok(())
    }

    pub fn set_port(&mut self, port: impl Into<String>) -> Result<()> {
        let port = port.into();
        check_text(&port, "port")?;
        self.port = port;
        Ok(())
    }

    /// Split the address into its parts for display or editing.
    ///
    /// An unset address yields the family's arity of empty strings. A hardware
    /// address without a known delimiter is logged and also yields empty parts.
    pub fn address_segments(&self) -> Vec<String> {
        let blank = || vec![String::new(); self.family.segment_count()];

        if self.address.is_empty() {
            return blank();
        }

        match self.family {
            AddressFamily::Ipv4 => self.address.split('.').map(str::to_string).collect(),
            AddressFamily::Hardware => match hardware_delimiter(&self.address) {
                Some(delimiter) => self.address.split(delimiter).map(str::to_string).collect(),
                None => {
                    tracing::error!(
                        "Unknown delimiter character used in the Bluetooth MAC address '{}'",
                        self.address
                    );
                    blank()
                }
            },
        }
    }

    /// True iff name, address and port are all empty
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.address.is_empty() && self.port.is_empty()
    }

    /// The `(address, port)` pair a transport should be opened with.
    ///
    /// Bluetooth channels are resolved by the paired device's name, so hardware
    /// hosts hand out their name and no port.
    pub fn endpoint(&self) -> (&str, &str) {
        match self.family {
            AddressFamily::Ipv4 => (&self.address, &self.port),
            AddressFamily::Hardware => (&self.name, ""),
        }
    }
}

impl Default for HostAddress {
    fn default() -> Self {
        Self::empty(AddressFamily::Ipv4)
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family {
            AddressFamily::Ipv4 => write!(f, "{},{},{}", self.name, self.address, self.port),
            AddressFamily::Hardware => write!(f, "{},{}", self.name, self.address),
        }
    }
}

fn require_field(value: &str, what: &str) -> Result<()> {
    if value.is_empty() {
        return Err(HostError::invalid(format!("The given {} is empty", what)));
    }
    Ok(())
}

fn check_text(value: &str, what: &str) -> Result<()> {
    if value.contains(FIELD_SEPARATOR) || value.contains(['\n', '\r']) {
        return Err(HostError::invalid(format!(
            "The given {} '{}' contains a separator or line break",
            what, value
        )));
    }
    Ok(())
}

fn check_ipv4(address: &str) -> Result<()> {
    let octets: Vec<&str> = address.split('.').collect();
    if octets.len() != IPV4_SEGMENTS {
        return Err(HostError::invalid(format!(
            "The size of the IP address {} is not {} numbers",
            address, IPV4_SEGMENTS
        )));
    }

    for octet in octets {
        if octet.is_empty() || octet.len() > 3 || !octet.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HostError::invalid(format!(
                "The IP address {} contains non-number characters in '{}'",
                address, octet
            )));
        }
        // at most three digits, so this cannot overflow u16
        let value: u16 = octet.parse().unwrap_or(u16::MAX);
        if value > 255 {
            return Err(HostError::invalid(format!(
                "The IP address contains number {} which is more than 255",
                octet
            )));
        }
    }
    Ok(())
}

fn check_port(port: &str) -> Result<()> {
    let digits = !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit());
    if digits && port.parse::<u16>().is_ok() {
        Ok(())
    } else {
        Err(HostError::invalid(format!(
            "The given port '{}' doesn't contain number",
            port
        )))
    }
}

fn hardware_delimiter(address: &str) -> Option<char> {
    if address.contains(':') {
        Some(':')
    } else if address.contains('-') {
        Some('-')
    } else {
        None
    }
}

fn check_hardware(address: &str) -> Result<()> {
    let delimiter = hardware_delimiter(address).ok_or_else(|| {
        HostError::invalid(format!(
            "The hardware address {} uses neither ':' nor '-' as delimiter",
            address
        ))
    })?;

    let parts: Vec<&str> = address.split(delimiter).collect();
    if parts.len() != HARDWARE_SEGMENTS {
        return Err(HostError::invalid(format!(
            "The hardware address {} doesn't have {} parts",
            address, HARDWARE_SEGMENTS
        )));
    }

    for part in parts {
        if part.is_empty() || part.len() > 2 || u8::from_str_radix(part, 16).is_err() {
            return Err(HostError::invalid(format!(
                "The hardware address {} contains the invalid part '{}'",
                address, part
            )));
        }
    }
    Ok(())
}
