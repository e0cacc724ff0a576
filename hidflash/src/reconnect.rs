//! Reconnect watcher.
//!
//! After the bootloader trigger the device drops off the bus and
//! re-enumerates under the same vendor/product id pair (the ephemeral
//! platform id changes). The watcher polls for the reappearance with a
//! fixed inter-attempt delay, under a hard deadline, and checks for
//! cancellation on every tick so an aborted session never acts on a stale
//! target.

use crate::error::{Error, Result};
use crate::session::CancelToken;
use crate::transport::HidConnector;
use log::{info, trace};
use std::thread;
use std::time::{Duration, Instant};

/// Delay between reconnect attempts.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Maximum total time to wait for re-enumeration.
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(30);

/// Bounded poller for the post-trigger re-enumeration.
#[derive(Debug, Clone)]
pub struct ReconnectWatcher {
    /// Delay between open attempts.
    pub poll_interval: Duration,
    /// Deadline for the whole wait; exceeding it yields
    /// [`Error::ReconnectTimeout`].
    pub max_wait: Duration,
}

impl Default for ReconnectWatcher {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

impl ReconnectWatcher {
    /// Create a watcher with explicit timing.
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait,
        }
    }

    /// Wait for `(vendor_id, product_id)` to come back and open it.
    ///
    /// Makes at least one attempt regardless of `max_wait`. Transient open
    /// failures are retried until the deadline; cancellation is honored
    /// between attempts and never leaves a connection open.
    pub fn wait<C: HidConnector>(
        &self,
        connector: &mut C,
        vendor_id: u16,
        product_id: u16,
        cancel: &CancelToken,
    ) -> Result<C::Transport> {
        info!("Waiting for {vendor_id:04x}:{product_id:04x} to re-enumerate...");

        let deadline = Instant::now() + self.max_wait;
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            attempt += 1;
            let present = match connector.enumerate() {
                Ok(devices) => devices
                    .iter()
                    .any(|d| d.key() == (vendor_id, product_id)),
                Err(e) => {
                    trace!("Enumeration failed on attempt {attempt}: {e}");
                    false
                }
            };

            if present {
                match connector.open(vendor_id, product_id) {
                    Ok(transport) => {
                        info!("Device re-enumerated after {attempt} attempt(s)");
                        return Ok(transport);
                    }
                    Err(e) => {
                        trace!("Reconnect attempt {attempt} failed to open: {e}");
                    }
                }
            } else {
                trace!("Device not present yet (attempt {attempt})");
            }

            if Instant::now() >= deadline {
                return Err(Error::ReconnectTimeout(self.max_wait));
            }
            thread::sleep(self.poll_interval);
        }
    }
}
