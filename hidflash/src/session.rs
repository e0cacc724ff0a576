//! Upload session state machine.
//!
//! One session owns one complete flash attempt:
//!
//! ```text
//! Idle -> ParsingFirmware -> LookingUpProfile -> Triggering
//!      -> AwaitingReconnect -> TransferringPages -> Completed
//! ```
//!
//! `Failed` is reachable from every non-terminal state and every error is
//! terminal for the session; a retry is a new session starting from page 0.
//! Connections are held in an owning guard so they are closed on success,
//! failure, and cancellation alike.

use crate::error::{Error, Result};
use crate::firmware::FirmwareImage;
use crate::protocol::{self, page};
use crate::reconnect::ReconnectWatcher;
use crate::target;
use crate::transport::{HidConnector, HidTransport};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Cooperative cancellation flag.
///
/// Cheap to clone; every clone observes the same flag. The CLI wires one to
/// Ctrl-C, tests flip it directly. Checked between protocol steps, never
/// mid-write, so cancellation can not tear a page.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Phase of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// Created, not yet run.
    Idle,
    /// Parsing the firmware text.
    ParsingFirmware,
    /// Resolving the device profile.
    LookingUpProfile,
    /// Sending the bootloader trigger over the application connection.
    Triggering,
    /// Polling for the device to re-enumerate.
    AwaitingReconnect,
    /// Streaming page writes.
    TransferringPages,
    /// All pages and the termination record acknowledged.
    Completed,
    /// Terminal failure; the error was returned to the caller.
    Failed,
}

/// Progress notifications delivered to the caller's callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// Firmware parsed into a flat image of this many bytes.
    Parsed {
        /// Image length in bytes.
        bytes: usize,
    },
    /// Bootloader trigger acknowledged; device is resetting.
    Triggered,
    /// Waiting for the device to come back on the bus.
    AwaitingReconnect,
    /// A data page was acknowledged.
    PageWritten {
        /// Byte offset of the page within the image.
        address: u32,
    },
    /// Transfer finished, termination record acknowledged.
    Completed,
    /// Session failed; the error is the session's return value.
    Failed,
}

/// Tracks which device identities have a live session.
///
/// A plain value the caller owns and clones, not process state. At most one
/// session may be active per (vendor id, product id) pair; the slot is
/// released when the session is dropped, however it ended.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    busy: Arc<Mutex<HashSet<(u16, u16)>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self, vendor_id: u16, product_id: u16) -> Result<SessionSlot> {
        let mut busy = lock(&self.busy);
        if !busy.insert((vendor_id, product_id)) {
            return Err(Error::SessionBusy {
                vendor_id,
                product_id,
            });
        }
        Ok(SessionSlot {
            registry: self.clone(),
            key: (vendor_id, product_id),
        })
    }

    /// Whether a session is currently active on this identity.
    pub fn is_busy(&self, vendor_id: u16, product_id: u16) -> bool {
        lock(&self.busy).contains(&(vendor_id, product_id))
    }
}

/// Exclusive claim on a device identity, released on drop.
#[derive(Debug)]
struct SessionSlot {
    registry: SessionRegistry,
    key: (u16, u16),
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        lock(&self.registry.busy).remove(&self.key);
    }
}

/// Owning wrapper that closes its connection on drop.
struct ConnectionGuard<T: HidTransport>(T);

impl<T: HidTransport> Deref for ConnectionGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: HidTransport> DerefMut for ConnectionGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: HidTransport> Drop for ConnectionGuard<T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// One complete flash attempt against a single device identity.
#[derive(Debug)]
pub struct UploadSession {
    vendor_id: u16,
    product_id: u16,
    state: UploadState,
    cancel: CancelToken,
    /// Timing for the post-trigger reconnect poll.
    pub watcher: ReconnectWatcher,
    _slot: SessionSlot,
}

impl UploadSession {
    /// Claim the device identity and create an idle session.
    ///
    /// Fails with [`Error::SessionBusy`] while another session on the same
    /// (vendor id, product id) pair is live anywhere in the process that
    /// shares `registry`.
    pub fn start(
        registry: &SessionRegistry,
        vendor_id: u16,
        product_id: u16,
        cancel: CancelToken,
    ) -> Result<Self> {
        let slot = registry.acquire(vendor_id, product_id)?;
        debug!("Session claimed {vendor_id:04x}:{product_id:04x}");
        Ok(Self {
            vendor_id,
            product_id,
            state: UploadState::Idle,
            cancel,
            watcher: ReconnectWatcher::default(),
            _slot: slot,
        })
    }

    /// Current phase.
    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Run the upload to completion.
    ///
    /// Emits [`UploadEvent`]s as phases complete. Any error moves the
    /// session to `Failed`, emits [`UploadEvent::Failed`], and is returned;
    /// nothing is retried here except the reconnect poll inside the watcher.
    pub fn run<C, F>(
        &mut self,
        connector: &mut C,
        firmware_text: &str,
        mut on_event: F,
    ) -> Result<()>
    where
        C: HidConnector,
        F: FnMut(UploadEvent),
    {
        match self.execute(connector, firmware_text, &mut on_event) {
            Ok(()) => {
                self.state = UploadState::Completed;
                info!(
                    "Upload to {:04x}:{:04x} complete",
                    self.vendor_id, self.product_id
                );
                on_event(UploadEvent::Completed);
                Ok(())
            }
            Err(e) => {
                self.state = UploadState::Failed;
                warn!(
                    "Upload to {:04x}:{:04x} failed: {e}",
                    self.vendor_id, self.product_id
                );
                on_event(UploadEvent::Failed);
                Err(e)
            }
        }
    }

    fn execute<C, F>(
        &mut self,
        connector: &mut C,
        firmware_text: &str,
        on_event: &mut F,
    ) -> Result<()>
    where
        C: HidConnector,
        F: FnMut(UploadEvent),
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.state = UploadState::ParsingFirmware;
        let image = FirmwareImage::from_ihex(firmware_text)?;
        on_event(UploadEvent::Parsed { bytes: image.len() });

        self.state = UploadState::LookingUpProfile;
        let profile = target::resolve(self.vendor_id, self.product_id)?;

        self.state = UploadState::Triggering;
        {
            let mut app = ConnectionGuard(connector.open(self.vendor_id, self.product_id)?);
            protocol::trigger_bootloader(&mut *app)?;
            // The device resets now; the guard closes the dead handle.
        }
        on_event(UploadEvent::Triggered);

        self.state = UploadState::AwaitingReconnect;
        on_event(UploadEvent::AwaitingReconnect);
        let transport =
            self.watcher
                .wait(connector, self.vendor_id, self.product_id, &self.cancel)?;
        let mut boot = ConnectionGuard(transport);

        self.state = UploadState::TransferringPages;
        page::transfer(&mut *boot, &image, profile, &self.cancel, |address| {
            on_event(UploadEvent::PageWritten { address });
        })
    }
}
