//! Door controller connection.
//!
//! The controller owns the serial link to the BCM. Commands are
//! fire-and-forget: `send_unlock` reports whether the line was written, never
//! whether the door physically opened. Inbound status lines are framed on a
//! dedicated reader thread and handed to the control loop through a channel,
//! where they only feed logging and counters.
//!
//! # Connectivity
//!
//! ```text
//!   connect() ──► Connected ──(write error / reader EOF)──► Disconnected
//!       │                                                       ▲
//!       └──────────────(no candidate device)────────────────────┘
//! ```
//!
//! There is no transition back to `Connected` once the link is lost.

use crate::codec::DoorLineCodec;
use crate::protocol::{DoorCommand, DoorStatus};
use bytes::BytesMut;
use carberus_core::constants::MAX_STATUS_LINE_LEN;
use carberus_core::{ConnectionState, EventCategory};
use carberus_hardware::serial::SerialDoorLink;
use carberus_hardware::{AnyDoorLink, DoorLink, LinkReader};
use serde::Serialize;
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tokio_util::codec::Decoder;
use tracing::{debug, error, info, warn};

/// Message from the reader thread.
#[derive(Debug)]
enum ReaderEvent {
    Status(DoorStatus),
    /// Lines the codec dropped since the previous report.
    Ignored(u64),
    LinkLost(String),
}

/// Door controller counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DoorStats {
    pub commands_sent: u64,
    pub send_failures: u64,
    pub unlock_acks: u64,
    pub lock_acks: u64,
    pub relock_timeouts: u64,
    pub ignored_lines: u64,
    pub link_losses: u64,
}

impl DoorStats {
    fn record_status(&mut self, status: DoorStatus) {
        match status {
            DoorStatus::Unlocked => self.unlock_acks += 1,
            DoorStatus::Locked => self.lock_acks += 1,
            DoorStatus::RelockTimeout => self.relock_timeouts += 1,
        }
    }
}

/// Background thread framing inbound bytes.
struct StatusReader {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl StatusReader {
    fn spawn(reader: LinkReader, tx: mpsc::UnboundedSender<ReaderEvent>) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread = std::thread::Builder::new().name("door-status".into()).spawn({
            let stop = Arc::clone(&stop);
            move || read_status(reader, &stop, &tx)
        })?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Signal the thread and wait for it. Bounded by the link's read poll
    /// interval.
    fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(
                category = EventCategory::Error.as_str(),
                "Door status reader panicked"
            );
        }
    }
}

impl Drop for StatusReader {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn read_status(mut reader: LinkReader, stop: &AtomicBool, tx: &mpsc::UnboundedSender<ReaderEvent>) {
    let mut codec = DoorLineCodec::new();
    let mut buf = BytesMut::with_capacity(MAX_STATUS_LINE_LEN);
    let mut chunk = [0u8; 64];
    let mut reported_ignored = 0;

    while !stop.load(Ordering::SeqCst) {
        match reader.read(&mut chunk) {
            Ok(0) => {
                if let Ok(Some(status)) = codec.decode_eof(&mut buf) {
                    let _ = tx.send(ReaderEvent::Status(status));
                }
                report_ignored(&codec, &mut reported_ignored, tx);
                if !stop.load(Ordering::SeqCst) {
                    let _ = tx.send(ReaderEvent::LinkLost("end of stream".to_string()));
                }
                return;
            }
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                while let Ok(Some(status)) = codec.decode(&mut buf) {
                    if tx.send(ReaderEvent::Status(status)).is_err() {
                        return;
                    }
                }
                report_ignored(&codec, &mut reported_ignored, tx);
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                if !stop.load(Ordering::SeqCst) {
                    let _ = tx.send(ReaderEvent::LinkLost(e.to_string()));
                }
                return;
            }
        }
    }
}

fn report_ignored(codec: &DoorLineCodec, reported: &mut u64, tx: &mpsc::UnboundedSender<ReaderEvent>) {
    let ignored = codec.ignored_lines();
    if ignored > *reported {
        let _ = tx.send(ReaderEvent::Ignored(ignored - *reported));
        *reported = ignored;
    }
}

/// Connection to the door controller.
///
/// # Examples
///
/// ```
/// use carberus_door::DoorController;
/// use carberus_hardware::mock::MockDoorLink;
///
/// #[tokio::main]
/// async fn main() {
///     let (link, handle) = MockDoorLink::new();
///     let mut door = DoorController::new();
///     assert!(door.attach(link).is_connected());
///
///     assert!(door.send_unlock().await);
///     assert_eq!(handle.sent_lines(), vec!["CMD_UNLOCK".to_string()]);
///
///     door.close().await;
/// }
/// ```
pub struct DoorController {
    link: Option<AnyDoorLink>,
    device: Option<String>,
    state: ConnectionState,
    events_rx: Option<mpsc::UnboundedReceiver<ReaderEvent>>,
    reader: Option<StatusReader>,
    stats: DoorStats,
}

impl DoorController {
    /// A controller with no link, as in logic-only mode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            link: None,
            device: None,
            state: ConnectionState::Disconnected,
            events_rx: None,
            reader: None,
            stats: DoorStats::default(),
        }
    }

    /// Probe `candidates` in order and open the first one that exists.
    ///
    /// Never fails: when no device is available the controller stays
    /// `Disconnected` and every later unlock is refused.
    pub fn connect(&mut self, candidates: &[PathBuf], baud_rate: u32) -> ConnectionState {
        if self.state.is_connected() {
            return self.state;
        }

        match SerialDoorLink::autodetect(candidates, baud_rate) {
            Ok(link) => self.attach(link),
            Err(e) => {
                warn!(
                    category = EventCategory::Connectivity.as_str(),
                    error = %e,
                    "No door controller found, running in logic-only mode"
                );
                self.state
            }
        }
    }

    /// Take ownership of an already-open link and start the status reader.
    pub fn attach(&mut self, link: impl Into<AnyDoorLink>) -> ConnectionState {
        let mut link = link.into();
        let info = link.info();

        match link.try_reader() {
            Ok(Some(reader)) => {
                let (tx, rx) = mpsc::unbounded_channel();
                match StatusReader::spawn(reader, tx) {
                    Ok(reader) => {
                        self.reader = Some(reader);
                        self.events_rx = Some(rx);
                    }
                    Err(e) => warn!(
                        category = EventCategory::Connectivity.as_str(),
                        error = %e,
                        "Door status reader not started"
                    ),
                }
            }
            Ok(None) => {}
            Err(e) => warn!(
                category = EventCategory::Connectivity.as_str(),
                error = %e,
                "Door status reader not started"
            ),
        }

        info!(
            category = EventCategory::Connectivity.as_str(),
            device = %info.name,
            path = %info.model,
            "Door controller connected"
        );
        self.device = Some(info.model);
        self.link = Some(link);
        self.state = ConnectionState::Connected;
        self.state
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Path or model of the attached device, if any was ever attached.
    #[must_use]
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    #[must_use]
    pub fn stats(&self) -> DoorStats {
        self.stats
    }

    /// Write the unlock command.
    ///
    /// Returns `true` iff the controller is connected and the write
    /// succeeded. A write failing because the device is gone marks the link
    /// lost; any other write fault only fails this command.
    pub async fn send_unlock(&mut self) -> bool {
        if !self.state.is_connected() {
            return false;
        }
        let Some(link) = self.link.as_mut() else {
            return false;
        };

        match link.send_line(DoorCommand::Unlock.as_line()).await {
            Ok(()) => {
                self.stats.commands_sent += 1;
                debug!(
                    category = EventCategory::Connectivity.as_str(),
                    command = %DoorCommand::Unlock,
                    "Command sent to BCM"
                );
                true
            }
            Err(e) if e.is_connection_loss() => {
                self.stats.send_failures += 1;
                self.mark_lost(&e.to_string());
                false
            }
            Err(e) => {
                self.stats.send_failures += 1;
                warn!(
                    category = EventCategory::Connectivity.as_str(),
                    error = %e,
                    "Unlock command not written"
                );
                false
            }
        }
    }

    /// Status lines received since the last call, in arrival order.
    pub fn drain_status(&mut self) -> Vec<DoorStatus> {
        let mut events = Vec::new();
        if let Some(rx) = self.events_rx.as_mut() {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }

        let mut statuses = Vec::with_capacity(events.len());
        for event in events {
            match event {
                ReaderEvent::Status(status) => {
                    self.stats.record_status(status);
                    info!(
                        category = EventCategory::System.as_str(),
                        status = status.as_line(),
                        "BCM: {status}"
                    );
                    statuses.push(status);
                }
                ReaderEvent::Ignored(count) => self.stats.ignored_lines += count,
                ReaderEvent::LinkLost(reason) => self.mark_lost(&reason),
            }
        }
        statuses
    }

    fn mark_lost(&mut self, reason: &str) {
        if !self.state.is_connected() {
            return;
        }
        self.state = ConnectionState::Disconnected;
        self.stats.link_losses += 1;
        error!(
            category = EventCategory::Connectivity.as_str(),
            device = self.device.as_deref().unwrap_or("unknown"),
            reason,
            "Door controller link lost, continuing in logic-only mode"
        );
    }

    /// Stop the status reader and release the port.
    pub async fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.stop();
        }
        self.events_rx = None;

        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.close().await {
                warn!(
                    category = EventCategory::Connectivity.as_str(),
                    error = %e,
                    "Error closing door controller link"
                );
            }
            info!(
                category = EventCategory::Connectivity.as_str(),
                "Door controller closed"
            );
        }
        self.state = ConnectionState::Disconnected;
    }
}

impl Default for DoorController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DoorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoorController")
            .field("device", &self.device)
            .field("state", &self.state)
            .field("reader", &self.reader.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}
