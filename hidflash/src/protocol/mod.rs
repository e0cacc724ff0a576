//! Bootloader wire protocol.
//!
//! The protocol is two report shapes deep:
//!
//! ```text
//! Trigger (feature report, id 255):
//! +---------------------------+
//! |        8 zero bytes       |
//! +---------------------------+
//!
//! Page write (output report, id 0):
//! +----------+----------------+
//! | addr LE16|  page_size data|
//! +----------+----------------+
//! ```
//!
//! The trigger is sent over the application-mode connection and makes the
//! device reset into its bootloader; the page writes happen on the fresh
//! connection obtained after re-enumeration. A final page with address
//! 0xFFFF and an all-zero payload ends the transfer.

pub mod page;

use crate::error::Result;
use crate::transport::HidTransport;
use log::debug;

/// Report id reserved for the bootloader trigger feature report.
pub const TRIGGER_REPORT_ID: u8 = 255;

/// Fixed length of the trigger feature report payload.
pub const TRIGGER_REPORT_LEN: usize = 8;

/// Report id used for page write output reports.
pub const PAGE_REPORT_ID: u8 = 0;

/// Address field value of the termination page.
pub const TERMINATION_ADDRESS: u16 = 0xFFFF;

/// Send the bootloader-trigger feature report.
///
/// Returns once the transport acknowledges the send. The device resets on
/// its own schedule afterwards: this function does NOT wait for it, and the
/// connection must be treated as dead from here on. Watching for the
/// re-enumeration is the reconnect watcher's job.
pub fn trigger_bootloader<T: HidTransport>(transport: &mut T) -> Result<()> {
    debug!("Triggering bootloader on {}", transport.identity());
    transport.send_feature_report(TRIGGER_REPORT_ID, &[0u8; TRIGGER_REPORT_LEN])
}
