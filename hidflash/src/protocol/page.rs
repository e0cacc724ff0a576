//! Page transfer engine.
//!
//! Streams a firmware image through page-sized HID output reports, one
//! report outstanding at a time, followed by a single termination record.
//!
//! ## Record format
//!
//! ```text
//! +--------+--------+------------------------+
//! | addr_l | addr_h |   DATA (page_size)     |
//! +--------+--------+------------------------+
//! | 1      | 1      |   page_size            |
//! +--------+--------+------------------------+
//! ```
//!
//! The 16-bit little-endian address field carries the raw byte offset for
//! parts with less than 64 KiB of flash, and `offset >> 8` for larger parts
//! (whose pages are at least 256 bytes, so no address bits are discarded).

use crate::error::{Error, Result};
use crate::firmware::FirmwareImage;
use crate::protocol::{PAGE_REPORT_ID, TERMINATION_ADDRESS};
use crate::session::CancelToken;
use crate::target::profile::DeviceProfile;
use crate::transport::HidTransport;
use byteorder::{LittleEndian, WriteBytesExt};
use log::{debug, trace};

/// One pending wire record: a firmware page or the termination sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWrite {
    /// Cursor byte offset of the page; `None` for the termination record.
    pub address: Option<u32>,
    /// Encoded record, `2 + page_size` bytes.
    pub record: Vec<u8>,
}

impl PageWrite {
    /// Address reported on failure: the cursor offset, or the termination
    /// sentinel value for the final record.
    fn failure_address(&self) -> u32 {
        self.address.unwrap_or(u32::from(TERMINATION_ADDRESS))
    }
}

/// Ordered sequence of page writes for one image.
///
/// Yields exactly `ceil(len / page_size)` data records with strictly
/// increasing addresses, then exactly one termination record. The cursor
/// advances by `page_size` per record and never reads past the image;
/// positions beyond the end are zero-filled.
pub struct PageStream<'a> {
    data: &'a [u8],
    profile: DeviceProfile,
    cursor: usize,
    terminated: bool,
}

impl<'a> PageStream<'a> {
    /// Create a page stream over an image buffer.
    pub fn new(data: &'a [u8], profile: DeviceProfile) -> Self {
        Self {
            data,
            profile,
            cursor: 0,
            terminated: false,
        }
    }

    /// Number of data records this stream will yield (termination excluded).
    pub fn page_count(&self) -> usize {
        self.data.len().div_ceil(self.profile.page_size)
    }

    fn encode_data_page(&self) -> Vec<u8> {
        let field = if self.profile.shifted_addressing() {
            (self.cursor >> 8) as u16
        } else {
            self.cursor as u16
        };

        let mut record = Vec::with_capacity(2 + self.profile.page_size);
        #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
        record.write_u16::<LittleEndian>(field).unwrap();

        let end = self.data.len().min(self.cursor + self.profile.page_size);
        record.extend_from_slice(&self.data[self.cursor..end]);
        record.resize(2 + self.profile.page_size, 0x00);

        record
    }

    fn encode_termination(&self) -> Vec<u8> {
        let mut record = Vec::with_capacity(2 + self.profile.page_size);
        #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
        record.write_u16::<LittleEndian>(TERMINATION_ADDRESS).unwrap();
        record.resize(2 + self.profile.page_size, 0x00);
        record
    }
}

impl Iterator for PageStream<'_> {
    type Item = PageWrite;

    fn next(&mut self) -> Option<PageWrite> {
        if self.cursor < self.data.len() {
            let page = PageWrite {
                address: Some(self.cursor as u32),
                record: self.encode_data_page(),
            };
            self.cursor += self.profile.page_size;
            Some(page)
        } else if !self.terminated {
            self.terminated = true;
            Some(PageWrite {
                address: None,
                record: self.encode_termination(),
            })
        } else {
            None
        }
    }
}

/// Drive a full page transfer through a transport.
///
/// Pipeline depth is 1: each record is sent only after the previous send
/// was acknowledged by the transport layer. A transport failure on any
/// write aborts the remaining sequence immediately with
/// [`Error::PageWrite`]; there is no per-page retry. `on_page` is invoked
/// with the cursor address after each acknowledged data page.
pub fn transfer<T, F>(
    transport: &mut T,
    image: &FirmwareImage,
    profile: DeviceProfile,
    cancel: &CancelToken,
    mut on_page: F,
) -> Result<()>
where
    T: HidTransport,
    F: FnMut(u32),
{
    debug!(
        "Transferring {} bytes in {}-byte pages to {}",
        image.len(),
        profile.page_size,
        transport.identity()
    );

    for page in PageStream::new(&image.data, profile) {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if let Err(e) = transport.send_report(PAGE_REPORT_ID, &page.record) {
            debug!("Page write failed: {e}");
            return Err(Error::PageWrite {
                address: page.failure_address(),
            });
        }

        match page.address {
            Some(address) => {
                trace!("Wrote page at {address:#06x}");
                on_page(address);
            }
            None => trace!("Wrote termination page"),
        }
    }

    debug!("Page transfer complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn profile(page_size: usize, flash_kb: u32) -> DeviceProfile {
        DeviceProfile {
            page_size,
            flash_kb,
        }
    }

    fn collect(data: &[u8], profile: DeviceProfile) -> Vec<PageWrite> {
        PageStream::new(data, profile).collect()
    }

    #[test]
    fn test_page_count_is_ceil_of_length_over_page_size() {
        assert_eq!(PageStream::new(&[], profile(128, 32)).page_count(), 0);
        assert_eq!(PageStream::new(&[0; 1], profile(128, 32)).page_count(), 1);
        assert_eq!(PageStream::new(&[0; 128], profile(128, 32)).page_count(), 1);
        assert_eq!(PageStream::new(&[0; 129], profile(128, 32)).page_count(), 2);
        assert_eq!(PageStream::new(&[0; 300], profile(256, 128)).page_count(), 2);
    }

    #[test]
    fn test_empty_image_yields_only_termination() {
        let pages = collect(&[], profile(128, 32));
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].address, None);
        assert_eq!(pages[0].record.len(), 130);
        assert_eq!(&pages[0].record[..2], &[0xFF, 0xFF]);
        assert!(pages[0].record[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_addresses_increase_by_page_size() {
        let data = vec![0xAB; 1000];
        let pages = collect(&data, profile(128, 32));
        // ceil(1000/128) = 8 data pages plus termination
        assert_eq!(pages.len(), 9);
        for (i, page) in pages[..8].iter().enumerate() {
            assert_eq!(page.address, Some(i as u32 * 128));
        }
        assert_eq!(pages[8].address, None);
    }

    #[test]
    fn test_raw_addressing_below_64k_flash() {
        let data = vec![0x11; 256];
        let pages = collect(&data, profile(128, 32));
        assert_eq!(&pages[0].record[..2], &[0x00, 0x00]);
        assert_eq!(&pages[1].record[..2], &[0x80, 0x00]); // 128 LE
    }

    #[test]
    fn test_shifted_addressing_at_64k_flash_and_above() {
        let data = vec![0x22; 768];
        let pages = collect(&data, profile(256, 128));
        // Address field is cursor >> 8: 0, 1, 2
        assert_eq!(&pages[0].record[..2], &[0x00, 0x00]);
        assert_eq!(&pages[1].record[..2], &[0x01, 0x00]);
        assert_eq!(&pages[2].record[..2], &[0x02, 0x00]);
    }

    #[test]
    fn test_tail_beyond_image_is_zero_filled() {
        // Image length 300, page size 256: second page holds 44 real bytes
        let data = vec![0x33; 300];
        let pages = collect(&data, profile(256, 128));
        assert_eq!(pages.len(), 3);

        let second = &pages[1].record;
        assert_eq!(second.len(), 258);
        assert!(second[2..2 + 44].iter().all(|&b| b == 0x33));
        assert!(second[2 + 44..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_exact_multiple_has_no_extra_data_page() {
        // 256 bytes with 128-byte pages: data pages at 0 and 128, then done
        let data = vec![0x44; 256];
        let pages = collect(&data, profile(128, 32));
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].address, Some(0));
        assert_eq!(pages[1].address, Some(128));
        assert_eq!(pages[2].address, None);
    }

    #[test]
    fn test_transfer_sends_all_records_on_report_id_zero() {
        let image = FirmwareImage {
            base_address: 0,
            data: vec![0x55; 256],
        };
        let mut transport = MockTransport::new();
        let cancel = CancelToken::new();
        let mut seen = Vec::new();

        transfer(&mut transport, &image, profile(128, 32), &cancel, |addr| {
            seen.push(addr);
        })
        .unwrap();

        assert_eq!(seen, vec![0, 128]);
        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        for (report_id, _) in &sent {
            assert_eq!(*report_id, PAGE_REPORT_ID);
        }
        assert_eq!(&sent[2].1[..2], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_transfer_aborts_on_write_failure() {
        let image = FirmwareImage {
            base_address: 0,
            data: vec![0x66; 512],
        };
        // Second write (page at address 128) fails
        let mut transport = MockTransport::failing_after(1);
        let cancel = CancelToken::new();
        let mut seen = Vec::new();

        let err = transfer(&mut transport, &image, profile(128, 32), &cancel, |addr| {
            seen.push(addr);
        })
        .unwrap_err();

        match err {
            Error::PageWrite { address } => assert_eq!(address, 128),
            other => panic!("expected PageWrite, got {other:?}"),
        }
        // Nothing after the failed page went out
        assert_eq!(seen, vec![0]);
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn test_transfer_stops_on_cancellation() {
        let image = FirmwareImage {
            base_address: 0,
            data: vec![0x77; 128],
        };
        let mut transport = MockTransport::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = transfer(&mut transport, &image, profile(128, 32), &cancel, |_| {})
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(transport.sent().is_empty());
    }
}
