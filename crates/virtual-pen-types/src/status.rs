//! Session status and error classification reported to callers.

use serde::{Deserialize, Serialize};

/// Coarse status of a transport session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No session has run yet.
    #[default]
    Idle,
    /// Waiting for a peer to connect.
    Listening,
    /// A peer or USB device is attached and samples may flow.
    Connected,
    /// The session ended because of a fatal error.
    Error,
    /// The session ended normally (stop request or device gone).
    Closed,
}

impl SessionStatus {
    /// Whether the session has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Error | Self::Closed)
    }

    /// Whether `next` may follow `self` within one session.
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (_, Self::Idle) => false,
            (Self::Error | Self::Closed, _) => false,
            (Self::Listening, Self::Listening) | (Self::Connected, Self::Connected) => false,
            _ => true,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Listening => write!(f, "Listening"),
            Self::Connected => write!(f, "Connected"),
            Self::Error => write!(f, "Error"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Error classes surfaced through the status callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A malformed record. Absorbed by the decoder, never fatal.
    Protocol,
    /// A peer sent too much data without a record delimiter.
    FramingOverflow,
    /// Bind, accept, read or USB failure.
    Transport,
    /// The host refused to create the virtual device.
    DeviceCreation,
    /// The pipeline was started with an invalid configuration.
    Precondition,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Protocol => write!(f, "protocol"),
            Self::FramingOverflow => write!(f, "framing overflow"),
            Self::Transport => write!(f, "transport"),
            Self::DeviceCreation => write!(f, "device creation"),
            Self::Precondition => write!(f, "precondition"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_lifecycle_is_allowed() {
        use SessionStatus::{Closed, Connected, Idle, Listening};
        assert!(Idle.can_transition_to(Listening));
        assert!(Listening.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Listening));
        assert!(Listening.can_transition_to(Closed));
    }

    #[test]
    fn terminal_states_are_final() {
        for next in [
            SessionStatus::Listening,
            SessionStatus::Connected,
            SessionStatus::Error,
            SessionStatus::Closed,
        ] {
            assert!(!SessionStatus::Closed.can_transition_to(next));
            assert!(!SessionStatus::Error.can_transition_to(next));
        }
        assert!(SessionStatus::Error.is_terminal());
        assert!(!SessionStatus::Connected.is_terminal());
    }

    #[test]
    fn idle_is_never_reentered() {
        assert!(!SessionStatus::Connected.can_transition_to(SessionStatus::Idle));
    }
}
