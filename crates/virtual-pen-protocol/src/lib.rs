//! Wire protocol and transports for virtual-pen.
//!
//! This crate decodes the companion client's newline-delimited records into
//! accessory events, and provides the two transports that carry them: a TCP
//! listener and (with the `usb` feature) an Android Open Accessory link.

#[cfg(feature = "usb")]
pub mod accessory;
pub mod decoder;
pub mod error;
pub mod tcp;
pub mod wire;

pub use decoder::{LineDecoder, Records, MAX_PENDING_BYTES};
pub use error::{ProtocolError, RecordError};
pub use tcp::{PenConnection, StylusListener, READ_CHUNK};
