//! The virtual stylus device.
//!
//! A [`VirtualStylus`] owns one backend device for the lifetime of a session.
//! Every accessory event becomes exactly one report batch, so the host never
//! observes a half-applied sample.

use tracing::{debug, info, trace};
use virtual_pen_types::{AccessoryEvent, DisplayMapping, PressureMapping, ToolType};

use crate::error::InputError;
use crate::translate::{CoordinateTranslator, PressureTranslator};
use crate::{PenTool, StylusCapabilities, StylusEmulation, StylusReport, HOST_PRESSURE_MAX};

/// Lifecycle of the backend device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Unopened,
    Open,
    Closed,
}

/// Stateful report generator on top of a [`StylusEmulation`] backend.
pub struct VirtualStylus {
    backend: Box<dyn StylusEmulation>,
    state: DeviceState,
    coordinates: CoordinateTranslator,
    pressure: PressureTranslator,
    /// Tool currently announced in proximity.
    in_range: Option<PenTool>,
    touching: bool,
    /// The current client has sent hover samples.
    hover_reported: bool,
    submitted: u64,
}

impl std::fmt::Debug for VirtualStylus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualStylus")
            .field("state", &self.state)
            .field("in_range", &self.in_range)
            .field("touching", &self.touching)
            .field("hover_reported", &self.hover_reported)
            .field("submitted", &self.submitted)
            .finish_non_exhaustive()
    }
}

impl VirtualStylus {
    /// Validate both mappings and declare the device to the host.
    ///
    /// Mapping errors are reported before the backend is touched.
    pub async fn open(
        mut backend: Box<dyn StylusEmulation>,
        display: &DisplayMapping,
        pressure: &PressureMapping,
        name: &str,
    ) -> Result<Self, InputError> {
        let coordinates = CoordinateTranslator::new(*display)?;
        let pressure = PressureTranslator::new(*pressure, HOST_PRESSURE_MAX)?;
        let (x_max, y_max) = coordinates.bounds();
        let caps = StylusCapabilities {
            name: name.to_string(),
            x_max,
            y_max,
            pressure_max: pressure.host_max(),
        };
        backend.create_device(&caps).await?;
        info!(name, x_max, y_max, "virtual stylus open");

        Ok(Self {
            backend,
            state: DeviceState::Open,
            coordinates,
            pressure,
            in_range: None,
            touching: false,
            hover_reported: false,
            submitted: 0,
        })
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn is_touching(&self) -> bool {
        self.touching
    }

    pub fn tool_in_range(&self) -> Option<PenTool> {
        self.in_range
    }

    /// Number of events successfully submitted.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Translate `event` and emit it as one batch.
    ///
    /// # Panics
    ///
    /// Panics if the device is not open.
    pub async fn submit(&mut self, event: &AccessoryEvent) -> Result<(), InputError> {
        assert_eq!(
            self.state,
            DeviceState::Open,
            "submit on a stylus that is not open"
        );

        let tool = pen_tool(event.tool);
        let (x, y) = self.coordinates.translate(event.raw_x, event.raw_y);
        let translated = self.pressure.translate(event.raw_pressure);
        // A contact below the pressure floor does not press the tip.
        let touching = event.contact && translated > 0;
        let hover_reported = self.hover_reported || event.action.is_hover();
        let stays = event.action.keeps_proximity(event.tool, hover_reported);

        let mut batch = Vec::with_capacity(7);
        let mut in_range = self.in_range;
        if in_range != Some(tool) {
            if let Some(previous) = in_range.take() {
                batch.push(StylusReport::Tool {
                    tool: previous,
                    in_range: false,
                });
            }
            if stays || touching {
                batch.push(StylusReport::Tool {
                    tool,
                    in_range: true,
                });
                in_range = Some(tool);
            }
        }
        batch.push(StylusReport::X(x));
        batch.push(StylusReport::Y(y));
        batch.push(StylusReport::Pressure(if touching { translated } else { 0 }));
        if touching != self.touching {
            batch.push(StylusReport::Touch(touching));
        }
        if !stays {
            if let Some(tool) = in_range.take() {
                batch.push(StylusReport::Tool {
                    tool,
                    in_range: false,
                });
            }
        }

        trace!(?event, ?batch, "submit");
        self.backend.emit(&batch).await?;
        self.in_range = in_range;
        self.touching = touching;
        self.hover_reported = hover_reported;
        self.submitted += 1;
        Ok(())
    }

    /// Lift the tip and leave proximity.
    ///
    /// Called when a client goes away, so the next one starts without a hover
    /// history. Emits nothing when the pen is already up and out of range.
    ///
    /// # Panics
    ///
    /// Panics if the device is not open.
    pub async fn release(&mut self) -> Result<(), InputError> {
        assert_eq!(
            self.state,
            DeviceState::Open,
            "release on a stylus that is not open"
        );

        self.hover_reported = false;
        let mut batch = Vec::with_capacity(3);
        if self.touching {
            batch.push(StylusReport::Pressure(0));
            batch.push(StylusReport::Touch(false));
        }
        if let Some(tool) = self.in_range {
            batch.push(StylusReport::Tool {
                tool,
                in_range: false,
            });
        }
        if batch.is_empty() {
            return Ok(());
        }

        debug!(?batch, "releasing stylus");
        self.backend.emit(&batch).await?;
        self.touching = false;
        self.in_range = None;
        Ok(())
    }

    /// Remove the device from the host. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), InputError> {
        match self.state {
            DeviceState::Closed => Ok(()),
            DeviceState::Unopened => {
                self.state = DeviceState::Closed;
                Ok(())
            }
            DeviceState::Open => {
                self.state = DeviceState::Closed;
                self.backend.destroy_device().await?;
                info!(submitted = self.submitted, "virtual stylus closed");
                Ok(())
            }
        }
    }
}

fn pen_tool(tool: ToolType) -> PenTool {
    match tool {
        ToolType::Eraser => PenTool::Rubber,
        ToolType::Finger | ToolType::Stylus => PenTool::Pen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEmulation, MockEmulationHandle};
    use virtual_pen_types::{FitMode, MappingError, MotionAction};

    use crate::StylusReport::{Pressure, Tool, Touch, X, Y};

    const PEN_IN: StylusReport = Tool {
        tool: PenTool::Pen,
        in_range: true,
    };
    const PEN_OUT: StylusReport = Tool {
        tool: PenTool::Pen,
        in_range: false,
    };
    const RUBBER_IN: StylusReport = Tool {
        tool: PenTool::Rubber,
        in_range: true,
    };

    async fn open_stylus() -> (VirtualStylus, MockEmulationHandle) {
        let mock = MockEmulation::new();
        let handle = mock.handle();
        let stylus = VirtualStylus::open(
            Box::new(mock),
            &DisplayMapping::new(1001, 501, FitMode::Stretched),
            &PressureMapping {
                min_pressure: 10,
                sensitivity: 0,
            },
            "Test Pen",
        )
        .await
        .unwrap();
        (stylus, handle)
    }

    fn event(tool: ToolType, action: MotionAction, x: f64, y: f64, p: f64) -> AccessoryEvent {
        AccessoryEvent::new(tool, action, x, y, p)
    }

    #[tokio::test]
    async fn open_declares_capabilities() {
        let (stylus, handle) = open_stylus().await;
        assert_eq!(stylus.state(), DeviceState::Open);
        assert_eq!(
            handle.created(),
            vec![StylusCapabilities {
                name: "Test Pen".to_string(),
                x_max: 1000,
                y_max: 500,
                pressure_max: HOST_PRESSURE_MAX,
            }]
        );
        assert_eq!(handle.open_devices(), 1);
    }

    #[tokio::test]
    async fn invalid_mapping_never_reaches_backend() {
        let mock = MockEmulation::new();
        let handle = mock.handle();
        let err = VirtualStylus::open(
            Box::new(mock),
            &DisplayMapping::new(0, 500, FitMode::Fixed),
            &PressureMapping::default(),
            "Test Pen",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InputError::Mapping(MappingError::DisplaySize { .. })));
        assert!(handle.created().is_empty());
    }

    #[tokio::test]
    async fn denied_creation_is_reported() {
        let mock = MockEmulation::failing("permission denied");
        let err = VirtualStylus::open(
            Box::new(mock),
            &DisplayMapping::new(1920, 1080, FitMode::Stretched),
            &PressureMapping::default(),
            "Test Pen",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InputError::VirtualDeviceCreate(_)));
        assert_eq!(err.kind(), virtual_pen_types::ErrorKind::DeviceCreation);
    }

    #[tokio::test]
    async fn stroke_produces_one_batch_per_event() {
        let (mut stylus, handle) = open_stylus().await;
        let stroke = [
            event(ToolType::Stylus, MotionAction::HoverEnter, 0.1, 0.1, 0.0),
            event(ToolType::Stylus, MotionAction::Down, 0.2, 0.2, 1.0),
            event(ToolType::Stylus, MotionAction::Move, 0.3, 0.3, 0.5),
            event(ToolType::Stylus, MotionAction::Up, 0.3, 0.3, 0.0),
            event(ToolType::Stylus, MotionAction::HoverExit, 0.3, 0.3, 0.0),
        ];
        for e in &stroke {
            stylus.submit(e).await.unwrap();
        }

        assert_eq!(
            handle.batches(),
            vec![
                vec![PEN_IN, X(100), Y(50), Pressure(0)],
                vec![X(200), Y(100), Pressure(4095), Touch(true)],
                vec![X(300), Y(150), Pressure(2048)],
                vec![X(300), Y(150), Pressure(0), Touch(false)],
                vec![X(300), Y(150), Pressure(0), PEN_OUT],
            ]
        );
        assert_eq!(stylus.submitted(), 5);
        assert_eq!(stylus.tool_in_range(), None);
    }

    #[tokio::test]
    async fn contact_below_floor_does_not_touch() {
        let (mut stylus, handle) = open_stylus().await;
        stylus
            .submit(&event(ToolType::Stylus, MotionAction::Down, 0.0, 0.0, 0.05))
            .await
            .unwrap();
        assert!(!stylus.is_touching());
        assert_eq!(handle.batches(), vec![vec![PEN_IN, X(0), Y(0), Pressure(0)]]);
    }

    #[tokio::test]
    async fn finger_up_leaves_proximity() {
        let (mut stylus, handle) = open_stylus().await;
        stylus
            .submit(&event(ToolType::Finger, MotionAction::Down, 1.0, 1.0, 1.0))
            .await
            .unwrap();
        stylus
            .submit(&event(ToolType::Finger, MotionAction::Up, 1.0, 1.0, 0.0))
            .await
            .unwrap();
        let batches = handle.batches();
        assert_eq!(
            batches[1],
            vec![X(1000), Y(500), Pressure(0), Touch(false), PEN_OUT]
        );
    }

    #[tokio::test]
    async fn stylus_up_leaves_proximity_when_client_never_hovers() {
        let (mut stylus, handle) = open_stylus().await;
        stylus
            .submit(&event(ToolType::Stylus, MotionAction::Down, 0.5, 0.5, 1.0))
            .await
            .unwrap();
        stylus
            .submit(&event(ToolType::Stylus, MotionAction::Up, 0.5, 0.5, 0.0))
            .await
            .unwrap();
        assert_eq!(
            handle.batches()[1],
            vec![X(500), Y(250), Pressure(0), Touch(false), PEN_OUT]
        );
        assert_eq!(stylus.tool_in_range(), None);
    }

    #[tokio::test]
    async fn release_forgets_hover_history() {
        let (mut stylus, handle) = open_stylus().await;
        stylus
            .submit(&event(ToolType::Stylus, MotionAction::HoverMove, 0.5, 0.5, 0.0))
            .await
            .unwrap();
        stylus.release().await.unwrap();

        // A client that only sends contact samples.
        stylus
            .submit(&event(ToolType::Stylus, MotionAction::Down, 0.5, 0.5, 1.0))
            .await
            .unwrap();
        stylus
            .submit(&event(ToolType::Stylus, MotionAction::Up, 0.5, 0.5, 0.0))
            .await
            .unwrap();
        assert_eq!(handle.batches().last().unwrap().last(), Some(&PEN_OUT));
        assert_eq!(stylus.tool_in_range(), None);
    }

    #[tokio::test]
    async fn switching_to_eraser_swaps_tools_first() {
        let (mut stylus, handle) = open_stylus().await;
        stylus
            .submit(&event(ToolType::Stylus, MotionAction::HoverMove, 0.5, 0.5, 0.0))
            .await
            .unwrap();
        stylus
            .submit(&event(ToolType::Eraser, MotionAction::Down, 0.5, 0.5, 1.0))
            .await
            .unwrap();
        assert_eq!(
            handle.batches()[1],
            vec![
                PEN_OUT,
                RUBBER_IN,
                X(500),
                Y(250),
                Pressure(4095),
                Touch(true)
            ]
        );
        assert_eq!(stylus.tool_in_range(), Some(PenTool::Rubber));
    }

    #[tokio::test]
    async fn exit_without_entry_announces_nothing() {
        let (mut stylus, handle) = open_stylus().await;
        stylus
            .submit(&event(ToolType::Stylus, MotionAction::HoverExit, 0.0, 0.0, 0.0))
            .await
            .unwrap();
        assert_eq!(handle.batches(), vec![vec![X(0), Y(0), Pressure(0)]]);
    }

    #[tokio::test]
    async fn release_lifts_and_leaves_in_one_batch() {
        let (mut stylus, handle) = open_stylus().await;
        stylus
            .submit(&event(ToolType::Stylus, MotionAction::Down, 0.5, 0.5, 1.0))
            .await
            .unwrap();
        stylus.release().await.unwrap();
        assert_eq!(
            handle.batches().last().unwrap(),
            &vec![Pressure(0), Touch(false), PEN_OUT]
        );
        assert!(!stylus.is_touching());
        assert_eq!(stylus.tool_in_range(), None);

        // Nothing left to release.
        stylus.release().await.unwrap();
        assert_eq!(handle.batches().len(), 2);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (mut stylus, handle) = open_stylus().await;
        stylus.close().await.unwrap();
        stylus.close().await.unwrap();
        assert_eq!(stylus.state(), DeviceState::Closed);
        assert_eq!(handle.destroyed(), 1);
        assert_eq!(handle.open_devices(), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "not open")]
    async fn submit_after_close_panics() {
        let (mut stylus, _handle) = open_stylus().await;
        stylus.close().await.unwrap();
        let _ = stylus
            .submit(&event(ToolType::Stylus, MotionAction::Move, 0.0, 0.0, 0.5))
            .await;
    }
}
