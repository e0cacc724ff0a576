//! Firmware image loading.
//!
//! The Intel-HEX grammar itself is the `ihex` crate's problem; this module
//! only flattens its record stream into the single contiguous byte buffer
//! the page transfer engine consumes. Gaps between records are zero-filled.

use crate::error::{Error, Result};
use ihex::Record;
use log::debug;

/// Upper bound on the flattened image span. Grammatically valid record
/// streams can still describe absurd spans (one record at 0, one near the
/// top of the address space); those are rejected instead of zero-filled.
const MAX_IMAGE_BYTES: u32 = 32 * 1024 * 1024;

/// A firmware image as one flat byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    /// Lowest absolute address seen in the source records.
    pub base_address: u32,
    /// Image bytes, contiguous from `base_address`; gaps zero-filled.
    pub data: Vec<u8>,
}

impl FirmwareImage {
    /// Parse Intel-HEX text into a flat image.
    ///
    /// Extended segment and extended linear address records shift subsequent
    /// data records as usual; start-address records are ignored (they name
    /// an entry point, not image contents).
    pub fn from_ihex(text: &str) -> Result<Self> {
        let mut chunks: Vec<(u32, Vec<u8>)> = Vec::new();
        let mut upper: u32 = 0;

        for record in ihex::Reader::new(text) {
            let record = record.map_err(|e| Error::Parse(e.to_string()))?;
            match record {
                Record::Data { offset, value } => {
                    chunks.push((upper + u32::from(offset), value));
                }
                Record::ExtendedSegmentAddress(segment) => {
                    upper = u32::from(segment) << 4;
                }
                Record::ExtendedLinearAddress(hi) => {
                    upper = u32::from(hi) << 16;
                }
                Record::EndOfFile => break,
                // Entry-point records carry no image bytes
                Record::StartSegmentAddress { .. } | Record::StartLinearAddress(_) => {}
            }
        }

        let Some(base_address) = chunks.iter().map(|(addr, _)| *addr).min() else {
            debug!("Firmware text contained no data records");
            return Ok(Self {
                base_address: 0,
                data: Vec::new(),
            });
        };

        let mut end = base_address;
        for (addr, bytes) in &chunks {
            let chunk_end = addr.checked_add(bytes.len() as u32).ok_or_else(|| {
                Error::Parse(format!(
                    "record at {addr:#x} extends past the 32-bit address space"
                ))
            })?;
            end = end.max(chunk_end);
        }

        let span = end - base_address;
        if span > MAX_IMAGE_BYTES {
            return Err(Error::Parse(format!(
                "image span of {span} bytes exceeds the {MAX_IMAGE_BYTES} byte limit"
            )));
        }

        let mut data = vec![0u8; span as usize];
        for (addr, bytes) in chunks {
            let start = (addr - base_address) as usize;
            data[start..start + bytes.len()].copy_from_slice(&bytes);
        }

        debug!(
            "Parsed firmware image: {} bytes at base {base_address:#x}",
            data.len()
        );

        Ok(Self { base_address, data })
    }

    /// Image length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image carries no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_record() {
        let image = FirmwareImage::from_ihex(":0400000001020304F2\n:00000001FF\n").unwrap();
        assert_eq!(image.base_address, 0);
        assert_eq!(image.data, vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_parse_gap_is_zero_filled() {
        // 4 bytes at 0x0000, 2 bytes at 0x0010
        let text = ":0400000001020304F2\n:02001000AABB89\n:00000001FF\n";
        let image = FirmwareImage::from_ihex(text).unwrap();
        assert_eq!(image.base_address, 0);
        assert_eq!(image.len(), 0x12);
        assert_eq!(&image.data[..4], &[0x01, 0x02, 0x03, 0x04]);
        assert!(image.data[4..0x10].iter().all(|&b| b == 0));
        assert_eq!(&image.data[0x10..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_parse_extended_linear_address() {
        // Upper word 0x0001 shifts the data record to 0x10000
        let text = ":020000040001F9\n:0400000001020304F2\n:00000001FF\n";
        let image = FirmwareImage::from_ihex(text).unwrap();
        assert_eq!(image.base_address, 0x10000);
        assert_eq!(image.data, vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_parse_empty_image() {
        let image = FirmwareImage::from_ihex(":00000001FF\n").unwrap();
        assert!(image.is_empty());
        assert_eq!(image.base_address, 0);
    }

    #[test]
    fn test_parse_record_past_address_space() {
        // Upper word 0xFFFF, 16 bytes at offset 0xFFF8: the record ends
        // beyond u32::MAX
        let text = ":02000004FFFFFC\n:10FFF80000000000000000000000000000000000F9\n:00000001FF\n";
        let result = FirmwareImage::from_ihex(text);
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_parse_rejects_oversized_span() {
        // 4 bytes at 0 and 4 bytes at 1 GiB would demand a 1 GiB zero-filled
        // buffer from two records
        let text =
            ":0400000001020304F2\n:020000044000BA\n:0400000001020304F2\n:00000001FF\n";
        let result = FirmwareImage::from_ihex(text);
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_parse_bad_checksum() {
        let result = FirmwareImage::from_ihex(":0400000001020304FF\n:00000001FF\n");
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_parse_garbage() {
        let result = FirmwareImage::from_ihex("not an intel hex file");
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
