//! uinput-based stylus emulation for Linux.

use async_trait::async_trait;
use evdev::uinput::VirtualDevice;
use evdev::{
    AbsInfo, AbsoluteAxisCode, AttributeSet, BusType, EventType, InputEvent, InputId,
    KeyCode as EvdevKey, PropType, UinputAbsSetup,
};
use tracing::{debug, info};

use crate::error::InputError;
use crate::{PenTool, StylusCapabilities, StylusEmulation, StylusReport};

const VENDOR: u16 = 0x0000;
const PRODUCT: u16 = 0x0000;
const VERSION: u16 = 0x0001;

/// Linux stylus emulation using a single uinput virtual device.
#[derive(Default)]
pub struct UinputEmulation {
    device: Option<VirtualDevice>,
}

impl UinputEmulation {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_virtual_device(caps: &StylusCapabilities) -> Result<VirtualDevice, InputError> {
        let create = |e: std::io::Error| InputError::VirtualDeviceCreate(e.to_string());

        let keys = stylus_keys();

        let mut props = AttributeSet::<PropType>::new();
        props.insert(PropType::DIRECT);

        let x = UinputAbsSetup::new(
            AbsoluteAxisCode::ABS_X,
            AbsInfo::new(0, 0, caps.x_max, 0, 0, 0),
        );
        let y = UinputAbsSetup::new(
            AbsoluteAxisCode::ABS_Y,
            AbsInfo::new(0, 0, caps.y_max, 0, 0, 0),
        );
        let pressure = UinputAbsSetup::new(
            AbsoluteAxisCode::ABS_PRESSURE,
            AbsInfo::new(0, 0, caps.pressure_max, 0, 0, 0),
        );

        VirtualDevice::builder()
            .map_err(create)?
            .name(&caps.name)
            .input_id(InputId::new(BusType::BUS_VIRTUAL, VENDOR, PRODUCT, VERSION))
            .with_keys(&keys)
            .map_err(create)?
            .with_properties(&props)
            .map_err(create)?
            .with_absolute_axis(&x)
            .map_err(create)?
            .with_absolute_axis(&y)
            .map_err(create)?
            .with_absolute_axis(&pressure)
            .map_err(create)?
            .build()
            .map_err(create)
    }
}

#[async_trait]
impl StylusEmulation for UinputEmulation {
    async fn create_device(&mut self, caps: &StylusCapabilities) -> Result<(), InputError> {
        if self.device.is_some() {
            return Err(InputError::VirtualDeviceCreate(
                "device already created".to_string(),
            ));
        }
        let device = Self::build_virtual_device(caps)?;
        info!(name = %caps.name, x_max = caps.x_max, y_max = caps.y_max, "created virtual device");
        self.device = Some(device);
        Ok(())
    }

    async fn emit(&mut self, batch: &[StylusReport]) -> Result<(), InputError> {
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| InputError::Emit("no virtual device".to_string()))?;

        let events: Vec<InputEvent> = batch.iter().map(report_to_evdev).collect();
        // `emit` appends the SYN_REPORT.
        device
            .emit(&events)
            .map_err(|e| InputError::Emit(e.to_string()))?;
        debug!(count = events.len(), "emitted batch");
        Ok(())
    }

    async fn destroy_device(&mut self) -> Result<(), InputError> {
        match self.device.take() {
            Some(_) => {
                info!("destroyed virtual device");
                Ok(())
            }
            None => Err(InputError::Emit("no virtual device".to_string())),
        }
    }
}

/// Keys the device advertises; exactly the ones [`report_to_evdev`] produces.
fn stylus_keys() -> AttributeSet<EvdevKey> {
    let mut keys = AttributeSet::<EvdevKey>::new();
    keys.insert(EvdevKey::BTN_TOOL_PEN);
    keys.insert(EvdevKey::BTN_TOOL_RUBBER);
    keys.insert(EvdevKey::BTN_TOUCH);
    keys
}

fn report_to_evdev(report: &StylusReport) -> InputEvent {
    match *report {
        StylusReport::Tool { tool, in_range } => {
            let key = match tool {
                PenTool::Pen => EvdevKey::BTN_TOOL_PEN,
                PenTool::Rubber => EvdevKey::BTN_TOOL_RUBBER,
            };
            InputEvent::new(EventType::KEY.0, key.0, i32::from(in_range))
        }
        StylusReport::X(value) => {
            InputEvent::new(EventType::ABSOLUTE.0, AbsoluteAxisCode::ABS_X.0, value)
        }
        StylusReport::Y(value) => {
            InputEvent::new(EventType::ABSOLUTE.0, AbsoluteAxisCode::ABS_Y.0, value)
        }
        StylusReport::Pressure(value) => InputEvent::new(
            EventType::ABSOLUTE.0,
            AbsoluteAxisCode::ABS_PRESSURE.0,
            value,
        ),
        StylusReport::Touch(down) => {
            InputEvent::new(EventType::KEY.0, EvdevKey::BTN_TOUCH.0, i32::from(down))
        }
    }
}
