//! # hidflash
//!
//! A library for flashing firmware onto USB-HID bootloaders.
//!
//! This crate provides the core functionality for uploading firmware to
//! AVR USB microcontrollers over vendor-specific HID reports, including:
//!
//! - Device profile table for supported controllers
//! - Bootloader trigger via feature report
//! - Reconnect watcher for the post-trigger re-enumeration
//! - Page transfer engine with address encoding and termination record
//! - Upload session state machine with cancellation
//!
//! ## Supported Controllers
//!
//! - AT90USB82/162/64x/128x
//! - ATmega8U2/16U2/32U2
//! - ATmega16U4/32U4
//!
//! ## Example
//!
//! ```rust,no_run
//! use hidflash::{CancelToken, SessionRegistry, UploadEvent, UploadSession};
//! use hidflash::transport::HidApiConnector;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let firmware = std::fs::read_to_string("firmware.hex")?;
//!
//!     let registry = SessionRegistry::new();
//!     let cancel = CancelToken::new();
//!     let mut connector = HidApiConnector::new()?;
//!
//!     // ATmega32U4 bootloader
//!     let mut session = UploadSession::start(&registry, 0x03EB, 0x2FF4, cancel)?;
//!     session.run(&mut connector, &firmware, |event| {
//!         if let UploadEvent::PageWritten { address } = event {
//!             println!("wrote page at {address:#06x}");
//!         }
//!     })?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod device;
pub mod error;
pub mod firmware;
pub mod protocol;
pub mod reconnect;
pub mod session;
pub mod target;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use {
    device::{DetectedDevice, DeviceIdentity, detect_devices, detect_supported_devices},
    error::{Error, Result},
    firmware::FirmwareImage,
    protocol::page::{PageStream, PageWrite},
    protocol::trigger_bootloader,
    reconnect::ReconnectWatcher,
    session::{CancelToken, SessionRegistry, UploadEvent, UploadSession, UploadState},
    target::{Controller, DeviceProfile, resolve},
    transport::{HidConnector, HidTransport},
};
