//! Controller profile table.
//!
//! Maps a USB device identity onto its flash geometry. The table keys
//! strictly by both vendor and product id; lookup is deterministic and
//! fails for anything not listed.

use crate::error::{Error, Result};
use std::fmt;

/// Atmel's USB vendor id, shared by all supported parts.
pub const ATMEL_VID: u16 = 0x03EB;

/// Flash geometry of a supported controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Flash page size in bytes; the unit of every data report.
    pub page_size: usize,
    /// Total flash size in KiB; selects the page address encoding.
    pub flash_kb: u32,
}

impl DeviceProfile {
    /// Whether the 16-bit address field carries `offset >> 8` instead of the
    /// raw byte offset. Parts with 64 KiB of flash or more overflow 16 bits,
    /// and their pages are at least 256 bytes, so the low 8 bits of a
    /// page-aligned offset are always zero and can be dropped.
    pub fn shifted_addressing(&self) -> bool {
        self.flash_kb >= 64
    }
}

/// Supported AVR USB controllers, by bootloader product id.
///
/// Parts that share a product id (e.g. AT90USB1286/1287) share a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Controller {
    /// AT90USB1286/1287 (PID 0x2FFB).
    At90Usb128x,
    /// AT90USB646/647 (PID 0x2FF9).
    At90Usb64x,
    /// AT90USB162 (PID 0x2FFA).
    At90Usb162,
    /// AT90USB82 (PID 0x2FF7).
    At90Usb82,
    /// ATmega32U4 (PID 0x2FF4).
    Atmega32U4,
    /// ATmega16U4 (PID 0x2FF3).
    Atmega16U4,
    /// ATmega32U2 (PID 0x2FF0).
    Atmega32U2,
    /// ATmega16U2 (PID 0x2FEF).
    Atmega16U2,
    /// ATmega8U2 (PID 0x2FEE).
    Atmega8U2,
}

/// Known bootloader product ids under [`ATMEL_VID`].
const BOOTLOADER_IDS: &[(u16, Controller)] = &[
    (0x2FFB, Controller::At90Usb128x),
    (0x2FF9, Controller::At90Usb64x),
    (0x2FFA, Controller::At90Usb162),
    (0x2FF7, Controller::At90Usb82),
    (0x2FF4, Controller::Atmega32U4),
    (0x2FF3, Controller::Atmega16U4),
    (0x2FF0, Controller::Atmega32U2),
    (0x2FEF, Controller::Atmega16U2),
    (0x2FEE, Controller::Atmega8U2),
];

impl Controller {
    /// Look up the controller for a vendor/product id pair.
    ///
    /// Both ids must match; a familiar product id under a foreign vendor id
    /// is rejected.
    #[must_use]
    pub fn from_vid_pid(vid: u16, pid: u16) -> Option<Self> {
        if vid != ATMEL_VID {
            return None;
        }
        BOOTLOADER_IDS
            .iter()
            .find(|(known_pid, _)| pid == *known_pid)
            .map(|(_, controller)| *controller)
    }

    /// Flash geometry for this controller.
    pub fn profile(&self) -> DeviceProfile {
        let (page_size, flash_kb) = match self {
            Self::At90Usb128x => (256, 128),
            Self::At90Usb64x => (256, 64),
            Self::At90Usb162 | Self::Atmega16U4 | Self::Atmega16U2 => (128, 16),
            Self::At90Usb82 | Self::Atmega8U2 => (128, 8),
            Self::Atmega32U4 | Self::Atmega32U2 => (128, 32),
        };
        DeviceProfile {
            page_size,
            flash_kb,
        }
    }

    /// Get a human-readable name for the controller.
    pub fn name(&self) -> &'static str {
        match self {
            Self::At90Usb128x => "AT90USB128x",
            Self::At90Usb64x => "AT90USB64x",
            Self::At90Usb162 => "AT90USB162",
            Self::At90Usb82 => "AT90USB82",
            Self::Atmega32U4 => "ATmega32U4",
            Self::Atmega16U4 => "ATmega16U4",
            Self::Atmega32U2 => "ATmega32U2",
            Self::Atmega16U2 => "ATmega16U2",
            Self::Atmega8U2 => "ATmega8U2",
        }
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve the flash profile for a vendor/product id pair.
pub fn resolve(vendor_id: u16, product_id: u16) -> Result<DeviceProfile> {
    Controller::from_vid_pid(vendor_id, product_id)
        .map(|controller| controller.profile())
        .ok_or(Error::UnknownDevice {
            vendor_id,
            product_id,
        })
}
