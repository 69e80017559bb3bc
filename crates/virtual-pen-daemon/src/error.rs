//! Daemon errors.

use thiserror::Error;
use virtual_pen_types::{ErrorKind, MappingError, TransportConfigError};

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("invalid pipeline configuration: {0}")]
    Precondition(String),

    #[error("a session is already running")]
    AlreadyRunning,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] virtual_pen_protocol::ProtocolError),

    #[error("input error: {0}")]
    Input(#[from] virtual_pen_input::InputError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DaemonError {
    /// Classify for the status callback.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Precondition(_) | Self::AlreadyRunning | Self::Config(_) => {
                ErrorKind::Precondition
            }
            Self::Protocol(e) => e.kind(),
            Self::Input(e) => e.kind(),
            Self::Other(_) => ErrorKind::Transport,
        }
    }
}

impl From<MappingError> for DaemonError {
    fn from(e: MappingError) -> Self {
        Self::Precondition(e.to_string())
    }
}

impl From<TransportConfigError> for DaemonError {
    fn from(e: TransportConfigError) -> Self {
        Self::Precondition(e.to_string())
    }
}
