//! hidflash CLI - Command-line tool for flashing USB-HID bootloaders.
//!
//! ## Features
//!
//! - Flash Intel-HEX firmware onto AVR USB bootloaders
//! - List connected HID devices and supported controllers
//! - Send hand-crafted reports for bring-up and debugging
//! - Shell completion generation
//! - Environment variable support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use hidflash::CancelToken;
use log::{debug, warn};
use std::env;
use std::path::PathBuf;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Check if animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(std::sync::atomic::Ordering::Relaxed) && console::colors_enabled_stderr()
}

mod commands;

use commands::{completions, flash, list, report};

/// hidflash - A tool for flashing firmware onto USB-HID bootloaders.
///
/// Environment variables:
///   HIDFLASH_VID    - Default USB vendor id (hex)
///   HIDFLASH_PID    - Default USB product id (hex)
#[derive(Parser)]
#[command(name = "hidflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output level (-v, -vv, -vvv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Flash an Intel-HEX firmware file.
    Flash {
        /// Path to the firmware file (Intel-HEX text).
        firmware: PathBuf,

        /// USB vendor id of the target (auto-detected if not specified).
        #[arg(long, env = "HIDFLASH_VID", value_parser = parse_hex_u16)]
        vid: Option<u16>,

        /// USB product id of the target (auto-detected if not specified).
        #[arg(long, env = "HIDFLASH_PID", value_parser = parse_hex_u16)]
        pid: Option<u16>,

        /// Seconds to wait for the device to re-enumerate after the trigger.
        #[arg(long, default_value = "30")]
        reconnect_timeout: u64,

        /// Milliseconds between reconnect attempts.
        #[arg(long, default_value = "500")]
        poll_interval: u64,
    },

    /// List connected HID devices.
    List {
        /// Show every HID device, not only supported controllers.
        #[arg(long)]
        all: bool,
    },

    /// Send a single raw report to a device.
    Report {
        /// Value to send: a hex string, a number, or plain text.
        value: String,

        /// USB vendor id of the target.
        #[arg(long, env = "HIDFLASH_VID", value_parser = parse_hex_u16)]
        vid: u16,

        /// USB product id of the target.
        #[arg(long, env = "HIDFLASH_PID", value_parser = parse_hex_u16)]
        pid: u16,

        /// Report id to send on.
        #[arg(long, default_value = "0")]
        report_id: u8,

        /// Send as a feature report instead of an output report.
        #[arg(long)]
        feature: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Parse a 16-bit hexadecimal id (supports 0x prefix).
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(s, 16).map_err(|e| format!("Invalid hex id: {e}"))
}

/// Map an error to the process exit code.
///
/// 1 generic, 2 usage (clap handles it), 4 device not reachable,
/// 130 cancelled.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<hidflash::Error>() {
        Some(hidflash::Error::Cancelled) => 130,
        Some(
            hidflash::Error::UnknownDevice { .. }
            | hidflash::Error::Connect(_)
            | hidflash::Error::ReconnectTimeout(_),
        ) => 4,
        _ => 1,
    }
}

fn main() {
    let cli = Cli::parse();

    // --- NO_COLOR and TTY detection (clig.dev best practice) ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, std::sync::atomic::Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "hidflash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
            warn!("Failed to install Ctrl-C handler: {e}");
        }
    }

    if let Err(err) = run(&cli, &cancel) {
        eprintln!("{} {err:#}", style("Error:").red().bold());
        std::process::exit(exit_code(&err));
    }
}

fn run(cli: &Cli, cancel: &CancelToken) -> Result<()> {
    match &cli.command {
        Commands::Flash {
            firmware,
            vid,
            pid,
            reconnect_timeout,
            poll_interval,
        } => flash::cmd_flash(
            cli.quiet,
            firmware,
            *vid,
            *pid,
            *reconnect_timeout,
            *poll_interval,
            cancel,
        ),
        Commands::List { all } => list::cmd_list(cli.quiet, *all),
        Commands::Report {
            value,
            vid,
            pid,
            report_id,
            feature,
        } => report::cmd_report(cli.quiet, *vid, *pid, *report_id, *feature, value),
        Commands::Completions { shell } => {
            completions::cmd_completions(*shell);
            Ok(())
        }
    }
}
