//! HID transport implementation using the `hidapi` crate.

use crate::device::DeviceIdentity;
use crate::error::{Error, Result};
use crate::transport::{HidConnector, HidTransport};
use hidapi::{HidApi, HidDevice};
use log::trace;

/// HID connection backed by `hidapi`.
pub struct HidApiTransport {
    device: Option<HidDevice>,
    identity: DeviceIdentity,
}

impl HidApiTransport {
    fn device(&self) -> Result<&HidDevice> {
        self.device
            .as_ref()
            .ok_or_else(|| Error::Connect("connection is closed".into()))
    }

    /// Assemble a numbered report: report id byte followed by the payload.
    fn framed(report_id: u8, data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + data.len());
        buf.push(report_id);
        buf.extend_from_slice(data);
        buf
    }
}

impl HidTransport for HidApiTransport {
    fn send_report(&mut self, report_id: u8, data: &[u8]) -> Result<()> {
        let buf = Self::framed(report_id, data);
        trace!(
            "Sending output report {} ({} bytes) to {}",
            report_id,
            data.len(),
            self.identity
        );
        self.device()?
            .write(&buf)
            .map_err(|e| Error::Connect(e.to_string()))?;
        Ok(())
    }

    fn send_feature_report(&mut self, report_id: u8, data: &[u8]) -> Result<()> {
        let buf = Self::framed(report_id, data);
        trace!(
            "Sending feature report {} ({} bytes) to {}",
            report_id,
            data.len(),
            self.identity
        );
        self.device()?
            .send_feature_report(&buf)
            .map_err(|e| Error::Connect(e.to_string()))?;
        Ok(())
    }

    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    fn close(&mut self) {
        // Take ownership of the handle and let it drop (close)
        self.device.take();
    }
}

/// HID connector backed by `hidapi`.
pub struct HidApiConnector {
    api: HidApi,
}

impl HidApiConnector {
    /// Initialize the underlying HID library.
    pub fn new() -> Result<Self> {
        let api = HidApi::new()?;
        Ok(Self { api })
    }
}

impl HidConnector for HidApiConnector {
    type Transport = HidApiTransport;

    fn enumerate(&mut self) -> Result<Vec<DeviceIdentity>> {
        self.api.refresh_devices()?;

        Ok(self
            .api
            .device_list()
            .map(|info| DeviceIdentity {
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
                path: info.path().to_string_lossy().into_owned(),
            })
            .collect())
    }

    fn open(&mut self, vendor_id: u16, product_id: u16) -> Result<Self::Transport> {
        self.api.refresh_devices()?;

        let info = self
            .api
            .device_list()
            .find(|info| info.vendor_id() == vendor_id && info.product_id() == product_id)
            .ok_or_else(|| {
                Error::Connect(format!("no HID device {vendor_id:04x}:{product_id:04x}"))
            })?;

        let identity = DeviceIdentity {
            vendor_id,
            product_id,
            path: info.path().to_string_lossy().into_owned(),
        };

        let device = self
            .api
            .open(vendor_id, product_id)
            .map_err(|e| Error::Connect(e.to_string()))?;
        trace!("Opened {identity}");

        Ok(HidApiTransport {
            device: Some(device),
            identity,
        })
    }
}
