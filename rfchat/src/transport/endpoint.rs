//! Connectable endpoint addresses.
//!
//! Discovery and service lookup happen outside this crate; whatever they
//! produce is handed over as an [`Endpoint`].

use std::fmt;
use std::str::FromStr;

use super::{TransportError, TransportType};

/// Highest valid RFCOMM channel number.
pub const MAX_RFCOMM_CHANNEL: u8 = 30;

/// Where to connect.
///
/// Accepted forms:
/// - `tcp://host:port` or bare `host:port`
/// - `rfcomm://AA:BB:CC:DD:EE:FF/channel`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A TCP `host:port`.
    Tcp(String),
    /// A Bluetooth device address and RFCOMM channel.
    Rfcomm {
        /// Device address, `AA:BB:CC:DD:EE:FF`.
        address: String,
        /// RFCOMM channel, `1..=30`.
        channel: u8,
    },
}

impl Endpoint {
    /// The transport this endpoint needs.
    #[must_use]
    pub const fn transport_type(&self) -> TransportType {
        match self {
            Self::Tcp(_) => TransportType::Tcp,
            Self::Rfcomm { .. } => TransportType::Rfcomm,
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidEndpoint(s.to_string());

        if let Some(rest) = s.strip_prefix("rfcomm://") {
            let (address, channel) = rest.rsplit_once('/').ok_or_else(invalid)?;
            let channel: u8 = channel.parse().map_err(|_| invalid())?;
            if !(1..=MAX_RFCOMM_CHANNEL).contains(&channel) || !is_device_address(address) {
                return Err(invalid());
            }
            return Ok(Self::Rfcomm {
                address: address.to_ascii_uppercase(),
                channel,
            });
        }

        let target = s.strip_prefix("tcp://").unwrap_or(s);
        let (host, port) = target.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(invalid());
        }
        Ok(Self::Tcp(target.to_string()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Rfcomm { address, channel } => write!(f, "rfcomm://{address}/{channel}"),
        }
    }
}

/// `AA:BB:CC:DD:EE:FF`: six two-digit hex octets.
fn is_device_address(s: &str) -> bool {
    let octets: Vec<&str> = s.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}
