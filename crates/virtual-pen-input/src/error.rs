//! Input subsystem errors.

use thiserror::Error;
use virtual_pen_types::{ErrorKind, MappingError};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("invalid mapping: {0}")]
    Mapping(#[from] MappingError),

    #[error("failed to create virtual device: {0}")]
    VirtualDeviceCreate(String),

    #[error("failed to emit reports: {0}")]
    Emit(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InputError {
    /// Classify for the status callback.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Mapping(_) => ErrorKind::Precondition,
            Self::VirtualDeviceCreate(_) => ErrorKind::DeviceCreation,
            Self::Emit(_) | Self::Other(_) => ErrorKind::Transport,
        }
    }
}
