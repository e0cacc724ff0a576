//! Test doubles for the transport layer.
//!
//! `MockTransport` records every report it is asked to send; `MockConnector`
//! hands out a scripted sequence of transports and keeps their logs so tests
//! can inspect connections after the session has dropped them.

use crate::device::DeviceIdentity;
use crate::error::{Error, Result};
use crate::transport::{HidConnector, HidTransport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Everything a mock connection observed.
#[derive(Debug, Default)]
pub struct TransportLog {
    /// Output reports sent, as (report id, payload).
    pub reports: Vec<(u8, Vec<u8>)>,
    /// Feature reports sent, as (report id, payload).
    pub features: Vec<(u8, Vec<u8>)>,
    /// Whether the connection was closed.
    pub closed: bool,
}

/// Scripted in-memory HID connection.
#[derive(Debug)]
pub struct MockTransport {
    log: Arc<Mutex<TransportLog>>,
    identity: DeviceIdentity,
    /// Fail output-report sends once this many have succeeded.
    fail_after: Option<usize>,
    /// Fail feature-report sends.
    fail_features: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::with_identity(0x03EB, 0x2FF4)
    }

    pub fn with_identity(vendor_id: u16, product_id: u16) -> Self {
        Self {
            log: Arc::new(Mutex::new(TransportLog::default())),
            identity: DeviceIdentity {
                vendor_id,
                product_id,
                path: "mock".to_string(),
            },
            fail_after: None,
            fail_features: false,
        }
    }

    /// Succeed the first `n` output-report sends, then fail every one after.
    pub fn failing_after(n: usize) -> Self {
        let mut transport = Self::new();
        transport.fail_after = Some(n);
        transport
    }

    /// Fail all feature-report sends.
    pub fn failing_features() -> Self {
        let mut transport = Self::new();
        transport.fail_features = true;
        transport
    }

    /// Shared handle to this connection's log.
    pub fn log(&self) -> Arc<Mutex<TransportLog>> {
        Arc::clone(&self.log)
    }

    /// Output reports sent so far.
    pub fn sent(&self) -> Vec<(u8, Vec<u8>)> {
        lock(&self.log).reports.clone()
    }
}

impl HidTransport for MockTransport {
    fn send_report(&mut self, report_id: u8, data: &[u8]) -> Result<()> {
        let mut log = lock(&self.log);
        if log.closed {
            return Err(Error::Connect("connection is closed".into()));
        }
        if let Some(n) = self.fail_after {
            if log.reports.len() >= n {
                return Err(Error::Connect("injected write failure".into()));
            }
        }
        log.reports.push((report_id, data.to_vec()));
        Ok(())
    }

    fn send_feature_report(&mut self, report_id: u8, data: &[u8]) -> Result<()> {
        let mut log = lock(&self.log);
        if log.closed {
            return Err(Error::Connect("connection is closed".into()));
        }
        if self.fail_features {
            return Err(Error::Connect("injected feature failure".into()));
        }
        log.features.push((report_id, data.to_vec()));
        Ok(())
    }

    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    fn close(&mut self) {
        lock(&self.log).closed = true;
    }
}

/// Scripted connector: hands out queued transports in order.
#[derive(Default)]
pub struct MockConnector {
    queue: VecDeque<MockTransport>,
    /// Fail this many open() calls before consulting the queue.
    pub fail_opens: usize,
    /// Total open() attempts observed.
    pub opens: usize,
    /// Logs of every transport ever queued, in queue order.
    pub logs: Vec<Arc<Mutex<TransportLog>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transport to be returned by a future open() call.
    pub fn push(&mut self, transport: MockTransport) {
        self.logs.push(transport.log());
        self.queue.push_back(transport);
    }

    /// Log of the `index`-th queued transport.
    pub fn log(&self, index: usize) -> std::sync::MutexGuard<'_, TransportLog> {
        lock(&self.logs[index])
    }
}

impl HidConnector for MockConnector {
    type Transport = MockTransport;

    fn enumerate(&mut self) -> Result<Vec<DeviceIdentity>> {
        Ok(self
            .queue
            .iter()
            .map(|t| t.identity.clone())
            .collect())
    }

    fn open(&mut self, _vendor_id: u16, _product_id: u16) -> Result<Self::Transport> {
        self.opens += 1;
        if self.fail_opens > 0 {
            self.fail_opens -= 1;
            return Err(Error::Connect("device absent".into()));
        }
        self.queue
            .pop_front()
            .ok_or_else(|| Error::Connect("device absent".into()))
    }
}
