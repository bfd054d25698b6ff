//! Mock door controller link for testing and development.
//!
//! This module provides a simulated BCM serial link that records every line
//! written to it and lets tests inject inbound status bytes.

use crate::{
    HardwareError, Result,
    traits::{DoorLink, LinkReader},
    types::DeviceInfo,
};
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Poll interval of the mock inbound reader.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Mock door controller link.
///
/// # Examples
///
/// ```
/// use carberus_hardware::mock::MockDoorLink;
/// use carberus_hardware::traits::DoorLink;
///
/// #[tokio::main]
/// async fn main() -> carberus_hardware::Result<()> {
///     let (mut link, handle) = MockDoorLink::new();
///
///     link.send_line("CMD_UNLOCK").await?;
///     assert_eq!(handle.sent_lines(), vec!["CMD_UNLOCK".to_string()]);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockDoorLink {
    name: String,
    state: Arc<SharedState>,
    inbound_rx: Option<mpsc::Receiver<Vec<u8>>>,
}

#[derive(Debug, Default)]
struct SharedState {
    sent: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
    stall_writes: AtomicBool,
    panic_writes: AtomicBool,
    closed: AtomicBool,
}

impl MockDoorLink {
    /// Create a new mock link with the default name.
    ///
    /// Returns the link and a handle used to inspect outbound lines and
    /// inject inbound bytes.
    pub fn new() -> (Self, MockDoorHandle) {
        Self::with_name("Mock BCM".to_string())
    }

    /// Create a new mock link with a custom name.
    pub fn with_name(name: String) -> (Self, MockDoorHandle) {
        let (inbound_tx, inbound_rx) = mpsc::channel();
        let state = Arc::new(SharedState::default());

        let link = Self {
            name,
            state: Arc::clone(&state),
            inbound_rx: Some(inbound_rx),
        };

        let handle = MockDoorHandle { state, inbound_tx };

        (link, handle)
    }
}

impl Default for MockDoorLink {
    fn default() -> Self {
        Self::new().0
    }
}

impl DoorLink for MockDoorLink {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(HardwareError::disconnected(self.name.clone()));
        }
        if self.state.panic_writes.load(Ordering::SeqCst) {
            panic!("mock link driver crashed");
        }
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(ErrorKind::BrokenPipe, "mock link unplugged").into());
        }
        if self.state.stall_writes.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(ErrorKind::TimedOut, "mock link busy").into());
        }

        self.state
            .sent
            .lock()
            .map_err(|_| HardwareError::communication("mock state poisoned"))?
            .push(line.to_string());
        Ok(())
    }

    fn try_reader(&mut self) -> Result<Option<LinkReader>> {
        Ok(self.inbound_rx.take().map(|rx| {
            Box::new(MockReader {
                rx,
                pending: Vec::new(),
            }) as LinkReader
        }))
    }

    async fn close(&mut self) -> Result<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.name.clone(), "Mock BCM v1.0")
    }
}

/// Inbound half of the mock link.
struct MockReader {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl Read for MockReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(READ_POLL_INTERVAL) {
                Ok(bytes) => self.pending = bytes,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    return Err(std::io::Error::new(ErrorKind::TimedOut, "no data"));
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

/// Handle for controlling a mock door link.
///
/// Dropping every handle ends the inbound stream, which the reader sees as
/// the link going away.
#[derive(Debug, Clone)]
pub struct MockDoorHandle {
    state: Arc<SharedState>,
    inbound_tx: mpsc::Sender<Vec<u8>>,
}

impl MockDoorHandle {
    /// Lines written by the ECU so far.
    pub fn sent_lines(&self) -> Vec<String> {
        self.state
            .sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Number of lines written so far.
    pub fn sent_count(&self) -> usize {
        self.state.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }

    /// Inject raw inbound bytes, as the BCM would send them.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader side has been dropped.
    pub fn push_inbound(&self, bytes: impl Into<Vec<u8>>) -> Result<()> {
        self.inbound_tx
            .send(bytes.into())
            .map_err(|_| HardwareError::disconnected("mock inbound channel closed"))
    }

    /// Inject one newline-terminated status line.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader side has been dropped.
    pub fn push_status_line(&self, line: &str) -> Result<()> {
        self.push_inbound(format!("{line}\n").into_bytes())
    }

    /// Make subsequent writes fail as if the cable was pulled.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes time out while the link stays attached.
    pub fn set_stall_writes(&self, stall: bool) {
        self.state.stall_writes.store(stall, Ordering::SeqCst);
    }

    /// Make subsequent writes panic, as a faulty driver would.
    pub fn set_panic_writes(&self, panic: bool) {
        self.state.panic_writes.store(panic, Ordering::SeqCst);
    }

    /// Whether the ECU closed the link.
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}
