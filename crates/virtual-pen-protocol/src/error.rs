//! Protocol and transport errors.

use thiserror::Error;
use virtual_pen_types::ErrorKind;

/// Why a single record was rejected. Never fatal to a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record is not valid UTF-8")]
    Encoding,

    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("field {field} is not numeric: {value:?}")]
    NotNumeric { field: &'static str, value: String },

    #[error("field {field} out of range: {value:?}")]
    OutOfRange { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("{pending} bytes buffered without a record delimiter (limit {limit})")]
    FramingOverflow { pending: usize, limit: usize },

    #[error("failed to bind listener: {0}")]
    Bind(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("USB error: {0}")]
    Usb(String),

    #[error("device disconnected")]
    Disconnected,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProtocolError {
    /// Classify for the status callback.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FramingOverflow { .. } => ErrorKind::FramingOverflow,
            Self::Bind(_)
            | Self::Connection(_)
            | Self::Usb(_)
            | Self::Disconnected
            | Self::Other(_) => ErrorKind::Transport,
        }
    }
}
