//! Error types for hidflash.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for hidflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for hidflash operations.
///
/// Every variant is terminal for the upload session it occurs in: the
/// session moves to `Failed` and surfaces the specific kind. Only the
/// reconnect watcher performs bounded automatic retry.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// HID transport error.
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    /// Malformed firmware image text.
    #[error("Firmware parse error: {0}")]
    Parse(String),

    /// No device profile for this vendor/product id pair.
    #[error("Unknown device {vendor_id:04x}:{product_id:04x}")]
    UnknownDevice {
        /// USB vendor id of the rejected device.
        vendor_id: u16,
        /// USB product id of the rejected device.
        product_id: u16,
    },

    /// Failed to open or address a device connection.
    #[error("Connection error: {0}")]
    Connect(String),

    /// Device did not re-enumerate within the bounded reconnect window.
    #[error("Device did not reconnect within {0:?}")]
    ReconnectTimeout(Duration),

    /// A page write failed mid-transfer; the remaining sequence is aborted.
    #[error("Page write failed at address {address:#06x}")]
    PageWrite {
        /// Byte offset of the page whose write failed.
        address: u32,
    },

    /// Another upload session is already active on this device identity.
    #[error("Upload already in progress on {vendor_id:04x}:{product_id:04x}")]
    SessionBusy {
        /// USB vendor id of the busy device.
        vendor_id: u16,
        /// USB product id of the busy device.
        product_id: u16,
    },

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// No candidate input decoder accepted the value.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
