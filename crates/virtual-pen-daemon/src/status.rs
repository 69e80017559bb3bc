//! Status reporting to the embedding application.

use tokio::sync::mpsc;
use tracing::{error, info};
use virtual_pen_types::{ErrorKind, SessionStatus};

/// Receives coarse session status changes and fatal errors.
///
/// Called from session workers; implementations must not block.
pub trait StatusSink: Send + Sync + 'static {
    fn on_status(&self, status: SessionStatus);

    /// A fatal error ended the session. Always followed by `Error`.
    fn on_error(&self, kind: ErrorKind, message: &str);
}

/// Writes every report to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn on_status(&self, status: SessionStatus) {
        info!(%status, "session status");
    }

    fn on_error(&self, kind: ErrorKind, message: &str) {
        error!(%kind, message, "session failed");
    }
}

/// One report as delivered to a [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Status(SessionStatus),
    Error(ErrorKind, String),
}

/// Forwards every report, in order, to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelSink {
    fn on_status(&self, status: SessionStatus) {
        // Nobody listening any more is fine.
        let _ = self.tx.send(StatusEvent::Status(status));
    }

    fn on_error(&self, kind: ErrorKind, message: &str) {
        let _ = self.tx.send(StatusEvent::Error(kind, message.to_string()));
    }
}
