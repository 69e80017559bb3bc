//! Host configuration loaded from TOML.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};
use virtual_pen_input::DEFAULT_DEVICE_NAME;
use virtual_pen_types::{
    AccessoryIdentity, DisplayMapping, FitMode, PressureMapping, TransportSelector, UsbDeviceId,
    DEFAULT_PORT,
};

use crate::pipeline::PipelineConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub pressure: PressureMapping,
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub accessory: AccessoryConfig,
}

impl Config {
    /// Default tracing filter directive.
    pub fn log_filter(&self) -> &str {
        if self.daemon.debug {
            "debug"
        } else {
            &self.daemon.log_level
        }
    }

    pub fn listener_transport(&self) -> TransportSelector {
        TransportSelector::Listener {
            addr: self.listener.addr(),
        }
    }

    pub fn accessory_transport(&self, device: UsbDeviceId) -> TransportSelector {
        TransportSelector::Accessory {
            device,
            identity: self.accessory.identity.clone(),
        }
    }

    /// Snapshot the mapping settings into a pipeline configuration.
    pub fn pipeline(&self, transport: TransportSelector) -> PipelineConfig {
        PipelineConfig {
            display: self.display.mapping(),
            pressure: self.pressure,
            transport,
            device_name: self.daemon.device_name.clone(),
        }
    }
}

/// Logging and device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Shorthand for `log_level = "debug"`.
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_device_name")]
    pub device_name: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            debug: false,
            device_name: default_device_name(),
        }
    }
}

/// Host display area and how the client's coordinates are fitted to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_screen_width")]
    pub width: u32,
    #[serde(default = "default_screen_height")]
    pub height: u32,
    #[serde(default)]
    pub fit: FitMode,
    /// Size of the client's drawing surface, in the pixels it reports.
    #[serde(default = "default_source_width")]
    pub source_width: f64,
    #[serde(default = "default_source_height")]
    pub source_height: f64,
    /// The client sends coordinates already scaled to `0.0..=1.0`.
    #[serde(default)]
    pub normalized: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_screen_width(),
            height: default_screen_height(),
            fit: FitMode::default(),
            source_width: default_source_width(),
            source_height: default_source_height(),
            normalized: false,
        }
    }
}

impl DisplayConfig {
    pub fn mapping(&self) -> DisplayMapping {
        let mapping = DisplayMapping::new(self.width, self.height, self.fit);
        if self.normalized {
            mapping
        } else {
            mapping.with_source(self.source_width, self.source_height)
        }
    }
}

/// TCP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl ListenerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// USB accessory settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessoryConfig {
    /// Device used when `usb` is given no id.
    #[serde(default)]
    pub device: Option<UsbDeviceId>,
    #[serde(default)]
    pub identity: AccessoryIdentity,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

fn default_screen_width() -> u32 {
    1920
}

fn default_screen_height() -> u32 {
    1080
}

// Portrait 1080x2400, a common phone panel.
fn default_source_width() -> f64 {
    1080.0
}

fn default_source_height() -> f64 {
    2400.0
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
