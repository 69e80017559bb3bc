//! Session slot state machine.

use virtual_pen_types::SessionStatus;

use crate::error::DaemonError;

/// The single session slot of a pipeline.
///
/// Guards the status sequence reported to callers: each session starts from
/// `Idle`, may alternate between `Listening` and `Connected`, and ends in
/// exactly one terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    running: bool,
    last_status: SessionStatus,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn last_status(&self) -> SessionStatus {
        self.last_status
    }

    /// Claim the slot for a new session.
    pub fn begin(&mut self) -> Result<(), DaemonError> {
        if self.running {
            return Err(DaemonError::AlreadyRunning);
        }
        self.running = true;
        self.last_status = SessionStatus::Idle;
        Ok(())
    }

    /// Record a non-terminal status. Returns `false` (and changes nothing)
    /// when the transition is not allowed or no session is running.
    pub fn transition(&mut self, next: SessionStatus) -> bool {
        if !self.running || next.is_terminal() || !self.last_status.can_transition_to(next) {
            return false;
        }
        self.last_status = next;
        true
    }

    /// Free the slot with a terminal status.
    pub fn finish(&mut self, status: SessionStatus) {
        debug_assert!(status.is_terminal(), "{status} is not terminal");
        self.running = false;
        self.last_status = status;
    }
}
