//! Advertisement scanner task.
//!
//! The radio stack is external; a bridge process writes each received
//! advertisement as one text line (`<company-id>:<payload>` in hex). The
//! scanner reads those lines, keeps advertisements carrying data under the
//! configured manufacturer id, validates the payload through the
//! [`TokenChannel`] and hands accepted events to the control loop over a
//! bounded queue.
//!
//! ```text
//! ┌──────────┐  lines  ┌─────────────┐  AuthEvent  ┌──────────────┐
//! │ radio    │────────►│ scanner     │────────────►│ control loop │
//! │ bridge   │         │ task        │  (bounded)  │ (drains/tick)│
//! └──────────┘         └─────────────┘             └──────────────┘
//! ```
//!
//! The scanner task owns the token channel, so it is the only writer of the
//! replay state. A queue slot is reserved before a payload is validated: a
//! counter is only marked as seen once its event is sure to reach the loop.
//! While the queue is full the scanner waits, and each wait is counted.

use carberus_core::{AuthEvent, EventCategory};
use carberus_token::{Advertisement, TokenChannel, TokenStats};
use futures::StreamExt;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Longest accepted advertisement line.
const MAX_LINE_LEN: usize = 1024;

/// Token events flowing to the control loop, plus the task producing them.
#[derive(Debug)]
pub struct TokenFeed {
    pub events: mpsc::Receiver<AuthEvent>,
    pub scanner: ScannerHandle,
    pub stats: Arc<TokenStats>,
}

/// Handle to a running scanner task.
#[derive(Debug)]
pub struct ScannerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ScannerHandle {
    /// Whether the task has ended, e.g. because the feed closed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop scanning and wait for the task to end.
    pub async fn stop(self) {
        self.cancel.cancel();
        match self.task.await {
            Ok(()) => info!(
                category = EventCategory::System.as_str(),
                "Advertisement scanner stopped"
            ),
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(
                category = EventCategory::Error.as_str(),
                error = %e,
                "Advertisement scanner task failed"
            ),
        }
    }
}

/// Spawn a scanner reading advertisement lines from `reader`.
///
/// Must be called within a Tokio runtime.
pub fn spawn_scanner<R>(
    reader: R,
    channel: TokenChannel,
    manufacturer_id: u16,
    queue_capacity: usize,
) -> TokenFeed
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, events) = mpsc::channel(queue_capacity.max(1));
    let stats = channel.stats();
    let cancel = CancellationToken::new();

    let scanner = Scanner {
        channel,
        manufacturer_id,
        tx,
    };
    let task = tokio::spawn(scanner.run(reader, cancel.clone()));

    TokenFeed {
        events,
        scanner: ScannerHandle { cancel, task },
        stats,
    }
}

struct Scanner {
    channel: TokenChannel,
    manufacturer_id: u16,
    tx: mpsc::Sender<AuthEvent>,
}

impl Scanner {
    async fn run<R>(mut self, reader: R, cancel: CancellationToken)
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LEN));
        info!(
            category = EventCategory::System.as_str(),
            manufacturer_id = format_args!("{:#06x}", self.manufacturer_id),
            "Advertisement scanner started"
        );

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return,
                next = lines.next() => next,
            };

            match next {
                Some(Ok(line)) => {
                    if !self.handle_line(&line, &cancel).await {
                        return;
                    }
                }
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    self.channel.stats().record_malformed_advertisement();
                    debug!(
                        category = EventCategory::Token.as_str(),
                        "Advertisement line too long"
                    );
                }
                Some(Err(LinesCodecError::Io(e))) => {
                    warn!(
                        category = EventCategory::Error.as_str(),
                        error = %e,
                        "Advertisement feed failed"
                    );
                    return;
                }
                None => {
                    info!(
                        category = EventCategory::System.as_str(),
                        "Advertisement feed closed"
                    );
                    return;
                }
            }
        }
    }

    /// Process one line. Returns `false` once the loop side is gone or the
    /// scanner was cancelled while waiting for queue space.
    async fn handle_line(&mut self, line: &str, cancel: &CancellationToken) -> bool {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return true;
        }

        let advertisement: Advertisement = match line.parse() {
            Ok(advertisement) => advertisement,
            Err(e) => {
                self.channel.stats().record_malformed_advertisement();
                debug!(
                    category = EventCategory::Token.as_str(),
                    error = %e,
                    "Malformed advertisement skipped"
                );
                return true;
            }
        };

        let Some(payload) = advertisement.manufacturer_data(self.manufacturer_id) else {
            trace!(
                category = EventCategory::Token.as_str(),
                "Advertisement without our manufacturer data"
            );
            return true;
        };

        let permit = match self.tx.try_reserve() {
            Ok(permit) => permit,
            Err(TrySendError::Full(())) => {
                self.channel.stats().record_queue_stall();
                debug!(
                    category = EventCategory::Token.as_str(),
                    "Token event queue full, waiting for the control loop"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return false,
                    permit = self.tx.reserve() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return false,
                    },
                }
            }
            Err(TrySendError::Closed(())) => return false,
        };

        if let Some(event) = self.channel.ingest(payload) {
            permit.send(event);
            self.persist_replay_state().await;
        }
        true
    }

    /// Commit the replay state on the blocking pool. Awaited before the next
    /// line so successive writes land in order.
    async fn persist_replay_state(&mut self) {
        let write = match self.channel.take_pending_write() {
            Ok(Some(write)) => write,
            Ok(None) => return,
            Err(e) => {
                error!(
                    category = EventCategory::Error.as_str(),
                    error = %e,
                    "Failed to serialize replay state"
                );
                return;
            }
        };

        let path = write.path().display().to_string();
        let outcome = tokio::task::spawn_blocking(move || write.commit()).await;
        // A failed write keeps the counter accepted; only restart protection
        // is lost.
        match outcome {
            Ok(Ok(())) => trace!(
                category = EventCategory::Security.as_str(),
                path = %path,
                "Replay state persisted"
            ),
            Ok(Err(e)) => error!(
                category = EventCategory::Error.as_str(),
                path = %path,
                error = %e,
                "Failed to persist replay state"
            ),
            Err(e) => error!(
                category = EventCategory::Error.as_str(),
                path = %path,
                error = %e,
                "Replay state writer failed"
            ),
        }
    }
}
