//! Raw report console for bring-up and debugging.
//!
//! The payload argument is decoded by trying candidates in a fixed order:
//! hex string first, then number, then plain text. The first decoder that
//! accepts the input wins, so `"1234"` is hex bytes `12 34`, not a number.

use anyhow::{Context, Result};
use console::style;
use hidflash::transport::{HidApiConnector, HidConnector, HidTransport};
use log::debug;

/// Decode a payload argument into report bytes.
///
/// Candidates, in order:
/// 1. hex string (optional `0x` prefix, even length) into raw bytes;
/// 2. number into a little-endian f32;
/// 3. text of up to 255 bytes into a length-prefixed UTF-8 string.
pub(crate) fn encode_value(value: &str) -> Result<Vec<u8>> {
    decode_hex(value)
        .or_else(|| decode_number(value))
        .or_else(|| decode_text(value))
        .ok_or_else(|| {
            hidflash::Error::InvalidInput(format!(
                "{value:?} is not hex, a number, or text under 256 bytes"
            ))
            .into()
        })
}

fn decode_hex(value: &str) -> Option<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}

fn decode_number(value: &str) -> Option<Vec<u8>> {
    let number: f32 = value.trim().parse().ok()?;
    Some(number.to_le_bytes().to_vec())
}

fn decode_text(value: &str) -> Option<Vec<u8>> {
    let text = value.as_bytes();
    if text.len() > 255 {
        return None;
    }
    let mut bytes = Vec::with_capacity(1 + text.len());
    bytes.push(text.len() as u8);
    bytes.extend_from_slice(text);
    Some(bytes)
}

/// Report command implementation.
pub(crate) fn cmd_report(
    quiet: bool,
    vid: u16,
    pid: u16,
    report_id: u8,
    feature: bool,
    value: &str,
) -> Result<()> {
    let payload = encode_value(value)?;
    debug!(
        "Sending {} report id {report_id} ({} bytes) to {vid:04x}:{pid:04x}",
        if feature { "feature" } else { "output" },
        payload.len()
    );

    let mut connector = HidApiConnector::new()?;
    let mut transport = connector
        .open(vid, pid)
        .with_context(|| format!("Failed to open device {vid:04x}:{pid:04x}"))?;

    let result = if feature {
        transport.send_feature_report(report_id, &payload)
    } else {
        transport.send_report(report_id, &payload)
    };
    transport.close();
    result?;

    if !quiet {
        eprintln!(
            "{} Sent {} bytes on report id {report_id}",
            style("✓").green(),
            payload.len()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_string_decodes_to_raw_bytes() {
        assert_eq!(encode_value("deadbeef").unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(encode_value("0x0102").unwrap(), vec![0x01, 0x02]);
        assert_eq!(encode_value("FF").unwrap(), vec![0xFF]);
    }

    #[test]
    fn test_hex_wins_over_number() {
        // "1234" parses as a number too, but hex is tried first
        assert_eq!(encode_value("1234").unwrap(), vec![0x12, 0x34]);
    }

    #[test]
    fn test_number_decodes_to_f32_le() {
        assert_eq!(encode_value("1.5").unwrap(), 1.5f32.to_le_bytes().to_vec());
        // Odd digit count disqualifies hex, so this is a number
        assert_eq!(encode_value("125").unwrap(), 125f32.to_le_bytes().to_vec());
        assert_eq!(encode_value("-2").unwrap(), (-2f32).to_le_bytes().to_vec());
    }

    #[test]
    fn test_text_is_length_prefixed() {
        assert_eq!(
            encode_value("hello").unwrap(),
            vec![5, b'h', b'e', b'l', b'l', b'o']
        );
        // Empty input is neither hex nor a number; it is the empty string
        assert_eq!(encode_value("").unwrap(), vec![0]);
    }

    #[test]
    fn test_oversized_text_is_rejected() {
        let long = "é".repeat(200); // 400 UTF-8 bytes, not hex, not a number
        assert!(encode_value(&long).is_err());
    }
}
