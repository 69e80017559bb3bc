//! Shared types for virtual-pen.
//!
//! This crate contains the types shared across the virtual-pen workspace:
//! decoded accessory events, display and pressure mappings, transport
//! selection, and the session status reported to callers.

pub mod event;
pub mod mapping;
pub mod status;
pub mod transport;

pub use event::{AccessoryEvent, MotionAction, ToolType};
pub use mapping::{
    Axis, DisplayMapping, FitMode, MappingError, PressureMapping, SourceExtent, MAX_DISPLAY_SIZE,
};
pub use status::{ErrorKind, SessionStatus};
pub use transport::{
    AccessoryIdentity, TransportConfigError, TransportSelector, UsbDeviceId, DEFAULT_PORT,
};
