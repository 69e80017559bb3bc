//! USB transport: Android Open Accessory (AOA) connection.
//!
//! The phone is first switched into accessory mode with the AOA vendor
//! requests, after which it re-enumerates under Google's accessory ids and
//! exposes a bulk endpoint carrying the same records as the TCP transport.
//!
//! Every call here blocks; the daemon drives it from a blocking task.

use std::time::{Duration, Instant};

use rusb::{
    Context, Device, DeviceHandle, Direction, Recipient, RequestType, TransferType, UsbContext,
};
use tracing::{debug, info, warn};
use virtual_pen_types::{AccessoryIdentity, UsbDeviceId};

use crate::error::ProtocolError;

const GOOGLE_VENDOR_ID: u16 = 0x18d1;
const ACCESSORY_PRODUCT_IDS: [u16; 2] = [0x2d00, 0x2d01];

const AOA_GET_PROTOCOL: u8 = 51;
const AOA_SEND_STRING: u8 = 52;
const AOA_START: u8 = 53;

const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);
const REENUMERATION_TIMEOUT: Duration = Duration::from_secs(5);
const REENUMERATION_POLL: Duration = Duration::from_millis(250);

/// Bulk reads return after this long without data so callers can re-check
/// their stop flag.
pub const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// A USB device as listed for selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDeviceInfo {
    pub id: UsbDeviceId,
    /// `Manufacturer-Product (Serial)`.
    pub label: String,
}

/// Enumerate USB devices whose string descriptors are readable.
///
/// Devices that cannot be opened (usually a permissions problem) are skipped.
pub fn list_devices() -> Result<Vec<UsbDeviceInfo>, ProtocolError> {
    let context = Context::new().map_err(usb_err)?;
    let mut result = Vec::new();

    for device in context.devices().map_err(usb_err)?.iter() {
        let Ok(desc) = device.device_descriptor() else {
            continue;
        };
        let handle = match device.open() {
            Ok(handle) => handle,
            Err(e) => {
                debug!(
                    bus = device.bus_number(),
                    address = device.address(),
                    error = %e,
                    "unable to open USB device"
                );
                continue;
            }
        };
        let (Ok(manufacturer), Ok(product), Ok(serial)) = (
            handle.read_manufacturer_string_ascii(&desc),
            handle.read_product_string_ascii(&desc),
            handle.read_serial_number_string_ascii(&desc),
        ) else {
            continue;
        };

        result.push(UsbDeviceInfo {
            id: UsbDeviceId::new(desc.vendor_id(), desc.product_id()),
            label: format!("{manufacturer}-{product} ({serial})"),
        });
    }

    Ok(result)
}

/// An open accessory-mode connection to the phone.
pub struct AccessoryConnection {
    handle: DeviceHandle<Context>,
    interface: u8,
    endpoint: u8,
}

impl AccessoryConnection {
    /// Switch `id` into accessory mode if needed and open its bulk IN endpoint.
    ///
    /// Only the selected device is used: after the handshake the phone is
    /// followed to its accessory ids on the same bus and port.
    pub fn open(id: UsbDeviceId, identity: &AccessoryIdentity) -> Result<Self, ProtocolError> {
        let context = Context::new().map_err(usb_err)?;

        let selected = find_device(&context, |c| c.id == id)?
            .ok_or_else(|| ProtocolError::Usb(format!("device {id} not found")))?;
        let origin = Candidate::of(&selected)
            .ok_or_else(|| ProtocolError::Usb(format!("device {id} has no descriptor")))?;

        let device = if origin.is_accessory() {
            debug!(device = %id, "device already in accessory mode");
            selected
        } else {
            start_accessory_mode(&selected, identity)?;
            drop(selected);
            wait_for_accessory(&context, origin)?
        };

        let (interface, endpoint) = bulk_in_endpoint(&device)?;
        let handle = device.open().map_err(usb_err)?;
        // Not supported everywhere; claiming below reports the real problem.
        let _ = handle.set_auto_detach_kernel_driver(true);
        handle.claim_interface(interface).map_err(usb_err)?;

        info!(device = %id, interface, endpoint, "accessory connection open");
        Ok(Self {
            handle,
            interface,
            endpoint,
        })
    }

    /// Read the next chunk of raw bytes.
    ///
    /// Returns `Ok(None)` when nothing arrived within [`READ_TIMEOUT`] and
    /// [`ProtocolError::Disconnected`] once the phone is unplugged.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<Option<usize>, ProtocolError> {
        match self.handle.read_bulk(self.endpoint, buf, READ_TIMEOUT) {
            Ok(n) => Ok(Some(n)),
            Err(rusb::Error::Timeout) => Ok(None),
            Err(rusb::Error::NoDevice) => Err(ProtocolError::Disconnected),
            Err(e) => Err(usb_err(e)),
        }
    }
}

impl Drop for AccessoryConnection {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(self.interface) {
            debug!(error = %e, "failed to release accessory interface");
        }
    }
}

/// What device selection looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    id: UsbDeviceId,
    bus: u8,
    port: u8,
}

impl Candidate {
    fn of(device: &Device<Context>) -> Option<Self> {
        let desc = device.device_descriptor().ok()?;
        Some(Self {
            id: UsbDeviceId::new(desc.vendor_id(), desc.product_id()),
            bus: device.bus_number(),
            port: device.port_number(),
        })
    }

    fn is_accessory(self) -> bool {
        self.id.vendor == GOOGLE_VENDOR_ID && ACCESSORY_PRODUCT_IDS.contains(&self.id.product)
    }

    /// Whether this is `origin` come back under the accessory ids.
    fn is_reenumeration_of(self, origin: Candidate) -> bool {
        self.is_accessory() && self.bus == origin.bus && self.port == origin.port
    }
}

fn find_device(
    context: &Context,
    wanted: impl Fn(&Candidate) -> bool,
) -> Result<Option<Device<Context>>, ProtocolError> {
    for device in context.devices().map_err(usb_err)?.iter() {
        if Candidate::of(&device).is_some_and(|c| wanted(&c)) {
            return Ok(Some(device));
        }
    }
    Ok(None)
}

fn start_accessory_mode(
    device: &Device<Context>,
    identity: &AccessoryIdentity,
) -> Result<(), ProtocolError> {
    let handle = device.open().map_err(usb_err)?;
    let read_type = rusb::request_type(Direction::In, RequestType::Vendor, Recipient::Device);
    let write_type = rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device);

    let mut version = [0u8; 2];
    handle
        .read_control(read_type, AOA_GET_PROTOCOL, 0, 0, &mut version, CONTROL_TIMEOUT)
        .map_err(usb_err)?;
    let protocol = u16::from_le_bytes(version);
    if protocol == 0 {
        return Err(ProtocolError::Usb(
            "device does not support Android accessory mode".to_string(),
        ));
    }
    debug!(protocol, "accessory protocol supported");

    for (index, value) in (0u16..).zip(identity.strings()) {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        handle
            .write_control(write_type, AOA_SEND_STRING, 0, index, &data, CONTROL_TIMEOUT)
            .map_err(usb_err)?;
    }

    handle
        .write_control(write_type, AOA_START, 0, 0, &[], CONTROL_TIMEOUT)
        .map_err(usb_err)?;
    info!("requested accessory mode");
    Ok(())
}

fn wait_for_accessory(
    context: &Context,
    origin: Candidate,
) -> Result<Device<Context>, ProtocolError> {
    let deadline = Instant::now() + REENUMERATION_TIMEOUT;
    loop {
        std::thread::sleep(REENUMERATION_POLL);
        if let Some(device) = find_device(context, |c| c.is_reenumeration_of(origin))? {
            return Ok(device);
        }
        if Instant::now() >= deadline {
            warn!("device did not re-enumerate in accessory mode");
            return Err(ProtocolError::Usb(
                "timed out waiting for accessory mode".to_string(),
            ));
        }
    }
}

fn bulk_in_endpoint(device: &Device<Context>) -> Result<(u8, u8), ProtocolError> {
    let config = device.active_config_descriptor().map_err(usb_err)?;
    for interface in config.interfaces() {
        for desc in interface.descriptors() {
            for endpoint in desc.endpoint_descriptors() {
                if endpoint.direction() == Direction::In
                    && endpoint.transfer_type() == TransferType::Bulk
                {
                    return Ok((desc.interface_number(), endpoint.address()));
                }
            }
        }
    }
    Err(ProtocolError::Usb(
        "accessory exposes no bulk IN endpoint".to_string(),
    ))
}

fn usb_err(e: rusb::Error) -> ProtocolError {
    ProtocolError::Usb(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(vendor: u16, product: u16, bus: u8, port: u8) -> Candidate {
        Candidate {
            id: UsbDeviceId::new(vendor, product),
            bus,
            port,
        }
    }

    #[test]
    fn accessory_ids_are_recognised() {
        assert!(candidate(0x18d1, 0x2d00, 1, 1).is_accessory());
        assert!(candidate(0x18d1, 0x2d01, 1, 1).is_accessory());
        assert!(!candidate(0x18d1, 0x4ee7, 1, 1).is_accessory());
        assert!(!candidate(0x04e8, 0x2d00, 1, 1).is_accessory());
    }

    #[test]
    fn reenumeration_must_come_back_on_the_same_port() {
        let phone = candidate(0x04e8, 0x6860, 2, 3);
        let same_port = candidate(0x18d1, 0x2d01, 2, 3);
        let other_phone = candidate(0x18d1, 0x2d00, 2, 4);
        let other_bus = candidate(0x18d1, 0x2d00, 1, 3);

        assert!(same_port.is_reenumeration_of(phone));
        assert!(!other_phone.is_reenumeration_of(phone));
        assert!(!other_bus.is_reenumeration_of(phone));
        // Still in normal mode on that port.
        assert!(!phone.is_reenumeration_of(phone));
    }
}
