//! HID device discovery and classification utilities.
//!
//! Discovery feeds the CLI device list; classification maps a raw USB
//! identity onto the supported controller table.

use crate::target::profile::Controller;
use log::{debug, trace};
use std::fmt;

/// Identity of an enumerated HID device.
///
/// Vendor and product id persist across reconnects. The platform `path` is
/// ephemeral per enumeration and must not be relied on after a bootloader
/// trigger: the device comes back under a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// USB vendor id.
    pub vendor_id: u16,
    /// USB product id.
    pub product_id: u16,
    /// Platform device path for this enumeration (e.g. a hidraw node).
    pub path: String,
}

impl DeviceIdentity {
    /// The `(vendor_id, product_id)` pair that survives re-enumeration.
    pub fn key(&self) -> (u16, u16) {
        (self.vendor_id, self.product_id)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// Discovered HID device with descriptor metadata.
#[derive(Debug, Clone)]
pub struct DetectedDevice {
    /// Device identity.
    pub identity: DeviceIdentity,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial: Option<String>,
    /// Matching controller, if the identity is in the profile table.
    pub controller: Option<Controller>,
}

impl DetectedDevice {
    /// Check if this device has a known flash profile.
    pub fn is_supported(&self) -> bool {
        self.controller.is_some()
    }
}

/// Detect all available HID devices with metadata.
pub fn detect_devices() -> Vec<DetectedDevice> {
    let mut result = Vec::new();

    match hidapi::HidApi::new() {
        Ok(api) => {
            for info in api.device_list() {
                let identity = DeviceIdentity {
                    vendor_id: info.vendor_id(),
                    product_id: info.product_id(),
                    path: info.path().to_string_lossy().into_owned(),
                };
                let controller =
                    Controller::from_vid_pid(identity.vendor_id, identity.product_id);

                trace!(
                    "Found HID device: {} (controller: {:?})",
                    identity, controller
                );

                result.push(DetectedDevice {
                    identity,
                    manufacturer: info.manufacturer_string().map(str::to_owned),
                    product: info.product_string().map(str::to_owned),
                    serial: info.serial_number().map(str::to_owned),
                    controller,
                });
            }
        }
        Err(e) => {
            debug!("Failed to enumerate HID devices: {e}");
        }
    }

    result
}

/// Detect devices that match a supported controller profile.
pub fn detect_supported_devices() -> Vec<DetectedDevice> {
    detect_devices()
        .into_iter()
        .filter(DetectedDevice::is_supported)
        .collect()
}

/// Format a list of detected devices for display.
pub fn format_device_list(devices: &[DetectedDevice]) -> Vec<String> {
    let mut result = Vec::new();

    for device in devices {
        let controller_info = match device.controller {
            Some(controller) => format!(" [{}]", controller.name()),
            None => String::new(),
        };

        let product_info = device
            .product
            .as_ref()
            .map(|p| format!(" - {p}"))
            .unwrap_or_default();

        result.push(format!(
            "{}{}{}",
            device.identity, controller_info, product_info
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(vendor_id: u16, product_id: u16) -> DeviceIdentity {
        DeviceIdentity {
            vendor_id,
            product_id,
            path: "/dev/hidraw0".to_string(),
        }
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(identity(0x03EB, 0x2FF4).to_string(), "03eb:2ff4");
    }

    #[test]
    fn test_identity_key_ignores_path() {
        let a = identity(0x03EB, 0x2FF4);
        let mut b = a.clone();
        b.path = "/dev/hidraw5".to_string();
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_detected_device_is_supported() {
        let supported = DetectedDevice {
            identity: identity(0x03EB, 0x2FF4),
            manufacturer: None,
            product: None,
            serial: None,
            controller: Controller::from_vid_pid(0x03EB, 0x2FF4),
        };
        assert!(supported.is_supported());

        let unknown = DetectedDevice {
            identity: identity(0x1234, 0x5678),
            manufacturer: None,
            product: None,
            serial: None,
            controller: None,
        };
        assert!(!unknown.is_supported());
    }

    #[test]
    fn test_format_device_list() {
        let devices = vec![
            DetectedDevice {
                identity: identity(0x03EB, 0x2FF4),
                manufacturer: Some("Atmel".to_string()),
                product: Some("ATmega32U4".to_string()),
                serial: None,
                controller: Controller::from_vid_pid(0x03EB, 0x2FF4),
            },
            DetectedDevice {
                identity: identity(0x1234, 0x5678),
                manufacturer: None,
                product: None,
                serial: None,
                controller: None,
            },
        ];

        let formatted = format_device_list(&devices);
        assert_eq!(formatted.len(), 2);
        assert!(formatted[0].contains("03eb:2ff4"));
        assert!(formatted[0].contains("ATmega32U4"));
        assert!(formatted[1].contains("1234:5678"));
    }

    #[test]
    fn test_detect_devices_does_not_panic() {
        // Just make sure enumeration is safe without hardware
        let _ = detect_devices();
    }
}
