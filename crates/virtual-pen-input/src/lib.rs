//! Translation and virtual stylus emulation for virtual-pen.
//!
//! This crate maps accessory events onto the host's coordinate and pressure
//! ranges and drives a virtual absolute-pointer device through the
//! [`StylusEmulation`] trait. The uinput backend lives behind the `linux`
//! feature; a recording backend for tests lives behind `mock`.

use async_trait::async_trait;

pub mod error;
#[cfg(feature = "linux")]
pub mod linux;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod stylus;
pub mod translate;

pub use error::InputError;
pub use stylus::{DeviceState, VirtualStylus};
pub use translate::{CoordinateTranslator, PressureTranslator};

/// Top of the host pressure axis.
pub const HOST_PRESSURE_MAX: i32 = 4095;

/// Name the virtual device is registered under.
pub const DEFAULT_DEVICE_NAME: &str = "Virtual Pen";

/// Axis ranges declared for the virtual device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylusCapabilities {
    pub name: String,
    /// Inclusive maximum of `ABS_X`; the minimum is 0.
    pub x_max: i32,
    /// Inclusive maximum of `ABS_Y`; the minimum is 0.
    pub y_max: i32,
    /// Inclusive maximum of `ABS_PRESSURE`; the minimum is 0.
    pub pressure_max: i32,
}

/// Tool announced through `BTN_TOOL_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PenTool {
    Pen,
    Rubber,
}

/// A single low-level report.
///
/// Reports are emitted in batches; each batch is terminated by exactly one
/// synchronization marker so consumers see a sample atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StylusReport {
    /// Tool entered (`true`) or left (`false`) proximity.
    Tool { tool: PenTool, in_range: bool },
    X(i32),
    Y(i32),
    Pressure(i32),
    /// Tip touching the surface.
    Touch(bool),
}

/// Creates a virtual stylus device and writes report batches to it.
#[async_trait]
pub trait StylusEmulation: Send + 'static {
    /// Declare the device to the host.
    async fn create_device(&mut self, caps: &StylusCapabilities) -> Result<(), InputError>;

    /// Write `batch` followed by a single synchronization marker.
    async fn emit(&mut self, batch: &[StylusReport]) -> Result<(), InputError>;

    /// Remove the device from the host.
    async fn destroy_device(&mut self) -> Result<(), InputError>;
}
