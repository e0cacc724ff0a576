//! Flash command implementation.

use anyhow::{Context, Result, bail};
use console::style;
use hidflash::transport::HidApiConnector;
use hidflash::{
    CancelToken, ReconnectWatcher, SessionRegistry, UploadEvent, UploadSession,
    detect_supported_devices, device::format_device_list,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use crate::use_fancy_output;

/// Resolve the flash target from explicit ids or auto-detection.
fn select_target(vid: Option<u16>, pid: Option<u16>) -> Result<(u16, u16)> {
    if let (Some(vid), Some(pid)) = (vid, pid) {
        return Ok((vid, pid));
    }

    let mut devices = detect_supported_devices();
    if let Some(vid) = vid {
        devices.retain(|d| d.identity.vendor_id == vid);
    }
    if let Some(pid) = pid {
        devices.retain(|d| d.identity.product_id == pid);
    }

    match devices.len() {
        0 => bail!("No supported device found. Specify --vid and --pid, or connect a device."),
        1 => Ok(devices[0].identity.key()),
        _ => {
            let lines = format_device_list(&devices);
            bail!(
                "Multiple supported devices found, specify --vid and --pid:\n  {}",
                lines.join("\n  ")
            )
        }
    }
}

/// Flash command implementation.
pub(crate) fn cmd_flash(
    quiet: bool,
    firmware: &Path,
    vid: Option<u16>,
    pid: Option<u16>,
    reconnect_timeout: u64,
    poll_interval: u64,
    cancel: &CancelToken,
) -> Result<()> {
    if !quiet {
        eprintln!(
            "{} Loading firmware from {}",
            style("📦").cyan(),
            firmware.display()
        );
    }

    let text = std::fs::read_to_string(firmware)
        .map_err(hidflash::Error::Io)
        .with_context(|| format!("Failed to read firmware file {}", firmware.display()))?;

    let (vid, pid) = select_target(vid, pid)?;
    let profile = hidflash::resolve(vid, pid)?;
    if !quiet {
        eprintln!(
            "{} Target {vid:04x}:{pid:04x} ({}-byte pages, {} KiB flash)",
            style("🔌").cyan(),
            profile.page_size,
            profile.flash_kb
        );
    }

    let mut connector = HidApiConnector::new()?;
    let registry = SessionRegistry::new();
    let mut session = UploadSession::start(&registry, vid, pid, cancel.clone())?;
    session.watcher = ReconnectWatcher::new(
        Duration::from_millis(poll_interval),
        Duration::from_secs(reconnect_timeout),
    );

    // Create progress bar
    let pb = if quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(0);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb
    };

    let page_size = profile.page_size;
    session.run(&mut connector, &text, |event| match event {
        UploadEvent::Parsed { bytes } => {
            pb.set_length(bytes.div_ceil(page_size) as u64);
            pb.set_message("parsed");
        }
        UploadEvent::Triggered => pb.set_message("triggered bootloader"),
        UploadEvent::AwaitingReconnect => pb.set_message("waiting for device"),
        UploadEvent::PageWritten { .. } => {
            pb.set_message("writing");
            pb.inc(1);
        }
        UploadEvent::Completed => pb.finish_with_message("done"),
        UploadEvent::Failed => pb.abandon_with_message("failed"),
    })?;

    if !quiet {
        eprintln!("\n{} Flash completed", style("🎉").green().bold());
    }

    Ok(())
}
