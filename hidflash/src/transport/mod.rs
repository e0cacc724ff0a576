//! HID transport abstraction.
//!
//! This module provides a unified `HidTransport` trait that separates report
//! I/O from protocol logic, so the upload engine and session state machine
//! stay transport-agnostic and fully testable against mocks.
//!
//! ```text
//! +---------------------+
//! |   Upload session    |
//! | (trigger, pages)    |
//! +----------+----------+
//!            |
//!            v
//! +----------+----------+
//! |  HidTransport trait |
//! +----------+----------+
//!            |
//!            v
//! +----------+----------+
//! |   HidApiTransport   |
//! |      (hidapi)       |
//! +---------------------+
//! ```
//!
//! Opening connections is separated into `HidConnector` because the device
//! disappears and re-enumerates mid-upload: the reconnect watcher needs to
//! mint fresh connections long after the original handle died.

pub mod native;

use crate::device::DeviceIdentity;
use crate::error::Result;

/// An open, exclusively owned HID connection.
///
/// The handle becomes invalid the instant the device resets into bootloader
/// mode; callers must not reuse it after sending the trigger report.
pub trait HidTransport: Send {
    /// Send an output report on the given report id.
    ///
    /// Returns once the transport layer acknowledges the send.
    fn send_report(&mut self, report_id: u8, data: &[u8]) -> Result<()>;

    /// Send a feature report on the given report id.
    fn send_feature_report(&mut self, report_id: u8, data: &[u8]) -> Result<()>;

    /// Identity of the device this connection was opened against.
    fn identity(&self) -> &DeviceIdentity;

    /// Close the connection and release the handle.
    ///
    /// Safe to call more than once; after closing, report sends fail.
    fn close(&mut self);
}

/// Factory for HID connections, keyed by vendor/product id.
///
/// The ephemeral per-enumeration id deliberately does not appear here: after
/// a bootloader trigger the device re-enumerates under a new one, and only
/// the (vid, pid) pair survives.
pub trait HidConnector {
    /// Concrete connection type produced by this connector.
    type Transport: HidTransport;

    /// List identities of all currently enumerated HID devices.
    fn enumerate(&mut self) -> Result<Vec<DeviceIdentity>>;

    /// Open a connection to the first device matching `(vendor_id, product_id)`.
    fn open(&mut self, vendor_id: u16, product_id: u16) -> Result<Self::Transport>;
}

pub use native::{HidApiConnector, HidApiTransport};
