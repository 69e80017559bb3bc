//! Accessory event types.
//!
//! One [`AccessoryEvent`] is one pointer sample sent by the companion client.
//! Tool and action codes are the Android `MotionEvent` constants the client
//! writes verbatim into each record.

use serde::{Deserialize, Serialize};

/// The tool that produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolType {
    Finger,
    Stylus,
    Eraser,
}

impl ToolType {
    /// Decode a `MotionEvent.TOOL_TYPE_*` code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Finger),
            2 => Some(Self::Stylus),
            4 => Some(Self::Eraser),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Finger => 1,
            Self::Stylus => 2,
            Self::Eraser => 4,
        }
    }

    /// Whether the tool can hover above the surface without touching it.
    #[must_use]
    pub fn can_hover(self) -> bool {
        !matches!(self, Self::Finger)
    }
}

/// What the pointer did in this sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionAction {
    Down,
    Up,
    Move,
    Cancel,
    HoverMove,
    HoverEnter,
    HoverExit,
}

impl MotionAction {
    /// Decode a `MotionEvent.ACTION_*` code. Multi-pointer and button actions
    /// are not part of the single-pen protocol and decode to `None`.
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Down),
            1 => Some(Self::Up),
            2 => Some(Self::Move),
            3 => Some(Self::Cancel),
            7 => Some(Self::HoverMove),
            9 => Some(Self::HoverEnter),
            10 => Some(Self::HoverExit),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Down => 0,
            Self::Up => 1,
            Self::Move => 2,
            Self::Cancel => 3,
            Self::HoverMove => 7,
            Self::HoverEnter => 9,
            Self::HoverExit => 10,
        }
    }

    /// Whether the pointer touches the surface during this action.
    #[must_use]
    pub fn is_contact(self) -> bool {
        matches!(self, Self::Down | Self::Move)
    }

    #[must_use]
    pub fn is_hover(self) -> bool {
        matches!(self, Self::HoverMove | Self::HoverEnter | Self::HoverExit)
    }

    /// Whether `tool` is still in proximity of the surface after this action.
    ///
    /// After `Up` only a tool that can hover stays in range, and only when the
    /// client reports hover at all; otherwise no `HoverExit` would ever follow.
    #[must_use]
    pub fn keeps_proximity(self, tool: ToolType, hover_reported: bool) -> bool {
        match self {
            Self::Down | Self::Move | Self::HoverMove | Self::HoverEnter => true,
            Self::Up => hover_reported && tool.can_hover(),
            Self::Cancel | Self::HoverExit => false,
        }
    }
}

/// One decoded pointer sample.
///
/// Coordinates are either normalized (`0.0..=1.0`) or in the client's native
/// pixel space, depending on the display mapping in use. Pressure is the
/// client's normalized pressure, nominally `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccessoryEvent {
    pub tool: ToolType,
    pub action: MotionAction,
    pub raw_x: f64,
    pub raw_y: f64,
    pub raw_pressure: f64,
    /// Whether the pointer touches the surface. Derived from `action`.
    pub contact: bool,
}

impl AccessoryEvent {
    #[must_use]
    pub fn new(
        tool: ToolType,
        action: MotionAction,
        raw_x: f64,
        raw_y: f64,
        raw_pressure: f64,
    ) -> Self {
        Self {
            tool,
            action,
            raw_x,
            raw_y,
            raw_pressure,
            contact: action.is_contact(),
        }
    }
}
