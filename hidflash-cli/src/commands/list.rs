//! Device listing command implementation.

use anyhow::Result;
use hidflash::device::{detect_devices, detect_supported_devices, format_device_list};

/// List command implementation.
///
/// Device lines go to stdout so the output can be piped; hints go to stderr.
pub(crate) fn cmd_list(quiet: bool, all: bool) -> Result<()> {
    let devices = if all {
        detect_devices()
    } else {
        detect_supported_devices()
    };

    if devices.is_empty() {
        if !quiet {
            if all {
                eprintln!("No HID devices found.");
            } else {
                eprintln!("No supported devices found. Use --all to list every HID device.");
            }
        }
        return Ok(());
    }

    for line in format_device_list(&devices) {
        println!("{line}");
    }

    Ok(())
}
