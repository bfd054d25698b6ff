//! The ECU control loop.
//!
//! Every tick:
//!
//! 1. drain door controller status lines (logging and counters only)
//! 2. drain token events queued by the scanner and trigger the arbiter
//! 3. capture one frame under a deadline, run face recognition and trigger
//!    the arbiter for each accepted face
//!
//! Between ticks the loop is suspended on the interval timer, which is where
//! the scanner task and the door status reader make progress. The capture
//! runs on the blocking pool; a capture that misses its deadline keeps
//! running in the background and no new capture starts until it returns.
//!
//! Teardown runs once after the loop ends, whatever ended it: stop the
//! scanner, release the camera, close the door controller, log telemetry.

use crate::arbiter::{Arbiter, UnlockDecision};
use crate::scanner::{ScannerHandle, TokenFeed};
use crate::telemetry::{LoopStats, TelemetrySnapshot};
use carberus_biometric::{BiometricChannel, BiometricStats};
use carberus_core::{AuthEvent, EventCategory};
use carberus_hardware::{AnyCamera, Camera, Frame, HardwareError};
use carberus_token::{TokenStats, TokenStatsSnapshot};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

type CaptureTask = JoinHandle<carberus_hardware::Result<Option<Frame>>>;

/// Camera plus the recognition channel fed from it.
struct Vision {
    camera: Arc<Mutex<AnyCamera>>,
    channel: Option<BiometricChannel>,
    capture_timeout: Duration,
    pending: Option<CaptureTask>,
}

/// Single-consumer control loop.
///
/// # Examples
///
/// ```
/// use carberus_door::DoorController;
/// use carberus_ecu::{Arbiter, EventLoop};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let arbiter = Arbiter::new(DoorController::new(), Duration::from_secs(5));
///     let event_loop = EventLoop::new(arbiter, Duration::from_millis(50));
///
///     let telemetry = event_loop
///         .run(tokio::time::sleep(Duration::from_millis(120)))
///         .await;
///     assert!(telemetry.ticks >= 2);
/// }
/// ```
pub struct EventLoop {
    arbiter: Arbiter,
    tick: Duration,
    token_events: Option<mpsc::Receiver<AuthEvent>>,
    scanner: Option<ScannerHandle>,
    token_stats: Option<Arc<TokenStats>>,
    vision: Option<Vision>,
    stats: LoopStats,
}

impl EventLoop {
    #[must_use]
    pub fn new(arbiter: Arbiter, tick: Duration) -> Self {
        Self {
            arbiter,
            tick,
            token_events: None,
            scanner: None,
            token_stats: None,
            vision: None,
            stats: LoopStats::default(),
        }
    }

    /// Consume token events from a running scanner.
    #[must_use]
    pub fn with_token_feed(mut self, feed: TokenFeed) -> Self {
        self.token_events = Some(feed.events);
        self.scanner = Some(feed.scanner);
        self.token_stats = Some(feed.stats);
        self
    }

    /// Capture from `camera` each tick and feed `channel`.
    ///
    /// Without a channel the camera is held open but never read.
    #[must_use]
    pub fn with_camera(
        mut self,
        camera: impl Into<AnyCamera>,
        channel: Option<BiometricChannel>,
        capture_timeout: Duration,
    ) -> Self {
        self.vision = Some(Vision {
            camera: Arc::new(Mutex::new(camera.into())),
            channel,
            capture_timeout,
            pending: None,
        });
        self
    }

    #[must_use]
    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    #[must_use]
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Current counters across every component.
    #[must_use]
    pub fn telemetry(&self) -> TelemetrySnapshot {
        TelemetrySnapshot::collect(
            self.token_stats(),
            self.biometric_stats(),
            self.arbiter.stats(),
            self.arbiter.door().stats(),
            self.stats,
        )
    }

    /// Tick until `shutdown` completes, then tear down.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> TelemetrySnapshot {
        tokio::pin!(shutdown);
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            category = EventCategory::System.as_str(),
            tick_ms = self.tick.as_millis() as u64,
            door = %self.arbiter.door().state(),
            tokens = self.token_events.is_some(),
            biometric = self.vision.as_ref().is_some_and(|v| v.channel.is_some()),
            "Control loop started"
        );

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!(
                        category = EventCategory::System.as_str(),
                        "Shutdown requested"
                    );
                    break;
                }
                _ = interval.tick() => {
                    if AssertUnwindSafe(self.tick()).catch_unwind().await.is_err() {
                        self.stats.panics += 1;
                        error!(
                            category = EventCategory::Error.as_str(),
                            "Control loop tick panicked, shutting down"
                        );
                        break;
                    }
                }
            }
        }

        self.shutdown().await
    }

    /// One loop iteration.
    pub async fn tick(&mut self) {
        self.stats.ticks += 1;

        self.arbiter.door_mut().drain_status();

        let mut token_events = Vec::new();
        if let Some(rx) = self.token_events.as_mut() {
            while let Ok(event) = rx.try_recv() {
                token_events.push(event);
            }
        }
        for event in token_events {
            self.stats.token_events += 1;
            self.dispatch(&event).await;
        }

        let Some(frame) = self.capture().await else {
            return;
        };
        let events = match self.vision.as_mut().and_then(|v| v.channel.as_mut()) {
            Some(channel) => channel.poll(&frame),
            None => return,
        };
        for event in events {
            self.stats.biometric_events += 1;
            self.dispatch(&event).await;
        }
    }

    async fn dispatch(&mut self, event: &AuthEvent) -> UnlockDecision {
        let decision = self.arbiter.trigger_event(event).await;
        debug!(
            category = EventCategory::System.as_str(),
            event = %event.describe(),
            decision = ?decision,
            "Authentication event dispatched"
        );
        decision
    }

    /// Capture one frame, waiting at most the capture timeout.
    async fn capture(&mut self) -> Option<Frame> {
        let vision = self.vision.as_mut()?;
        vision.channel.as_ref()?;

        if let Some(pending) = vision.pending.as_ref() {
            if !pending.is_finished() {
                return None;
            }
            // Finished after its deadline; the frame is stale.
            vision.pending = None;
        }

        let camera = Arc::clone(&vision.camera);
        let mut task = tokio::task::spawn_blocking(move || {
            let mut camera = camera
                .lock()
                .map_err(|_| HardwareError::capture("camera lock poisoned"))?;
            camera.capture()
        });

        match tokio::time::timeout(vision.capture_timeout, &mut task).await {
            Ok(Ok(Ok(Some(frame)))) => {
                self.stats.frames_captured += 1;
                Some(frame)
            }
            Ok(Ok(Ok(None))) => None,
            Ok(Ok(Err(e))) => {
                self.stats.capture_failures += 1;
                warn!(
                    category = EventCategory::Error.as_str(),
                    error = %e,
                    "Frame capture failed"
                );
                None
            }
            Ok(Err(e)) => {
                self.stats.capture_failures += 1;
                warn!(
                    category = EventCategory::Error.as_str(),
                    error = %e,
                    "Frame capture task failed"
                );
                None
            }
            Err(_) => {
                self.stats.capture_timeouts += 1;
                debug!(
                    category = EventCategory::Biometric.as_str(),
                    timeout_ms = vision.capture_timeout.as_millis() as u64,
                    "Frame capture missed its deadline"
                );
                vision.pending = Some(task);
                None
            }
        }
    }

    /// Release every resource and return the final counters.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&mut self) -> TelemetrySnapshot {
        if let Some(scanner) = self.scanner.take() {
            scanner.stop().await;
        }
        self.token_events = None;

        if let Some(vision) = self.vision.as_mut() {
            if let Some(pending) = vision.pending.take() {
                let _ = tokio::time::timeout(vision.capture_timeout, pending).await;
            }
            release_camera(&vision.camera);
        }

        self.arbiter.door_mut().close().await;

        let snapshot = self.telemetry();
        snapshot.log();
        snapshot
    }

    /// Token counters, zero when no feed is attached.
    #[must_use]
    pub fn token_stats(&self) -> TokenStatsSnapshot {
        self.token_stats
            .as_ref()
            .map(|stats| stats.snapshot())
            .unwrap_or_default()
    }

    /// Biometric counters, zero when face recognition is disabled.
    #[must_use]
    pub fn biometric_stats(&self) -> BiometricStats {
        self.vision
            .as_ref()
            .and_then(|vision| vision.channel.as_ref())
            .map(BiometricChannel::stats)
            .unwrap_or_default()
    }
}

fn release_camera(camera: &Mutex<AnyCamera>) {
    match camera.try_lock() {
        Ok(mut camera) => camera.release(),
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().release(),
        Err(TryLockError::WouldBlock) => warn!(
            category = EventCategory::Error.as_str(),
            "Camera still capturing at shutdown, released when the capture returns"
        ),
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("arbiter", &self.arbiter)
            .field("tick", &self.tick)
            .field("tokens", &self.token_events.is_some())
            .field("camera", &self.vision.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}
