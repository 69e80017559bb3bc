//! Transport selection: TCP listener or USB accessory.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port the companion client connects to by default.
pub const DEFAULT_PORT: u16 = 4545;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportConfigError {
    #[error("listen port must be non-zero")]
    ZeroPort,

    #[error("invalid USB device id {0:?}, expected vvvv:pppp in hex")]
    DeviceId(String),
}

/// A USB device identified by vendor and product id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UsbDeviceId {
    pub vendor: u16,
    pub product: u16,
}

impl UsbDeviceId {
    #[must_use]
    pub fn new(vendor: u16, product: u16) -> Self {
        Self { vendor, product }
    }
}

impl FromStr for UsbDeviceId {
    type Err = TransportConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TransportConfigError::DeviceId(s.to_string());
        let (vendor, product) = s.trim().split_once(':').ok_or_else(err)?;
        if vendor.is_empty() || product.is_empty() {
            return Err(err());
        }
        let vendor = u16::from_str_radix(vendor, 16).map_err(|_| err())?;
        let product = u16::from_str_radix(product, 16).map_err(|_| err())?;
        Ok(Self { vendor, product })
    }
}

impl TryFrom<String> for UsbDeviceId {
    type Error = TransportConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UsbDeviceId> for String {
    fn from(id: UsbDeviceId) -> Self {
        id.to_string()
    }
}

impl std::fmt::Display for UsbDeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.product)
    }
}

/// Strings announced to the phone when switching it into accessory mode.
///
/// The companion app's accessory filter matches on manufacturer and model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryIdentity {
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_serial")]
    pub serial: String,
}

impl Default for AccessoryIdentity {
    fn default() -> Self {
        Self {
            manufacturer: default_manufacturer(),
            model: default_model(),
            description: default_description(),
            version: default_version(),
            uri: default_uri(),
            serial: default_serial(),
        }
    }
}

impl AccessoryIdentity {
    /// Identity strings in AOA `SEND_STRING` index order.
    pub fn strings(&self) -> [&str; 6] {
        [
            self.manufacturer.as_str(),
            self.model.as_str(),
            self.description.as_str(),
            self.version.as_str(),
            self.uri.as_str(),
            self.serial.as_str(),
        ]
    }
}

/// Which transport loop a session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSelector {
    /// Accept TCP connections on `addr`, one at a time.
    Listener { addr: SocketAddr },
    /// Read records from a USB device switched into accessory mode.
    Accessory {
        device: UsbDeviceId,
        identity: AccessoryIdentity,
    },
}

impl TransportSelector {
    /// Listen on all IPv4 interfaces.
    #[must_use]
    pub fn listener(port: u16) -> Self {
        Self::Listener {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        }
    }

    pub fn validate(&self) -> Result<(), TransportConfigError> {
        match self {
            Self::Listener { addr } if addr.port() == 0 => Err(TransportConfigError::ZeroPort),
            _ => Ok(()),
        }
    }
}

fn default_manufacturer() -> String {
    "Virtual Pen".to_string()
}

fn default_model() -> String {
    "Virtual Pen".to_string()
}

fn default_description() -> String {
    "Use your phone as a pen for your computer".to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_uri() -> String {
    "https://github.com/androidvirtualpen/virtualpen".to_string()
}

fn default_serial() -> String {
    "0000000012345678".to_string()
}
