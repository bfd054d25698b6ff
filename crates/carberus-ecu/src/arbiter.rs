//! Unlock arbitration.
//!
//! The [`Arbiter`] is the only writer of the cooldown timestamp and the only
//! caller of [`DoorController::send_unlock`]. It is owned by the control
//! loop, so triggers from both channels are serialized by construction.

use carberus_core::{AuthEvent, AuthSource, EventCategory};
use carberus_door::DoorController;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockDecision {
    /// The unlock command was written to the door controller.
    Granted,
    /// An unlock happened within the cooldown window; nothing was sent.
    CooldownActive { remaining: Duration },
    /// The door controller is not connected or the write failed.
    HardwareUnavailable,
}

impl UnlockDecision {
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Arbiter counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArbiterStats {
    pub unlocks_granted: u64,
    pub cooldown_rejections: u64,
    pub hardware_unavailable: u64,
}

/// Single authority over unlock commands.
///
/// # Examples
///
/// ```
/// use carberus_core::AuthSource;
/// use carberus_door::DoorController;
/// use carberus_ecu::Arbiter;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     // Logic-only mode: no door controller attached.
///     let mut arbiter = Arbiter::new(DoorController::new(), Duration::from_secs(5));
///     assert!(!arbiter.trigger(AuthSource::Token, None).await);
///     assert!(arbiter.last_unlock().is_none());
/// }
/// ```
#[derive(Debug)]
pub struct Arbiter {
    door: DoorController,
    cooldown: Duration,
    last_unlock: Option<Instant>,
    stats: ArbiterStats,
}

impl Arbiter {
    #[must_use]
    pub fn new(door: DoorController, cooldown: Duration) -> Self {
        Self {
            door,
            cooldown,
            last_unlock: None,
            stats: ArbiterStats::default(),
        }
    }

    /// Request an unlock; `true` iff the command was sent.
    pub async fn trigger(&mut self, source: AuthSource, label: Option<&str>) -> bool {
        self.decide(source, label, Instant::now()).await.is_granted()
    }

    /// [`trigger`](Self::trigger) for a channel event.
    pub async fn trigger_event(&mut self, event: &AuthEvent) -> UnlockDecision {
        self.decide(event.source, event.label.as_deref(), Instant::now())
            .await
    }

    /// Decide at an explicit instant.
    ///
    /// The cooldown rejects any request at most `cooldown` after the last
    /// successful unlock. A request that fails at the door controller leaves
    /// the cooldown untouched.
    pub async fn decide(
        &mut self,
        source: AuthSource,
        label: Option<&str>,
        now: Instant,
    ) -> UnlockDecision {
        if let Some(last) = self.last_unlock {
            let elapsed = now.saturating_duration_since(last);
            if elapsed <= self.cooldown {
                self.stats.cooldown_rejections += 1;
                let remaining = self.cooldown - elapsed;
                debug!(
                    category = EventCategory::System.as_str(),
                    source = %source,
                    remaining_ms = remaining.as_millis() as u64,
                    "Unlock suppressed by cooldown"
                );
                return UnlockDecision::CooldownActive { remaining };
            }
        }

        let via = match label {
            Some(label) => format!("{} ({label})", source.display_name()),
            None => source.display_name().to_string(),
        };

        if !self.door.send_unlock().await {
            self.stats.hardware_unavailable += 1;
            warn!(
                category = EventCategory::Connectivity.as_str(),
                source = %source,
                "Access granted via {via} but door controller is unavailable"
            );
            return UnlockDecision::HardwareUnavailable;
        }

        self.last_unlock = Some(now);
        self.stats.unlocks_granted += 1;
        info!(
            category = EventCategory::System.as_str(),
            source = %source,
            "ACCESS GRANTED via {via}"
        );
        UnlockDecision::Granted
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    #[must_use]
    pub fn last_unlock(&self) -> Option<Instant> {
        self.last_unlock
    }

    #[must_use]
    pub fn stats(&self) -> ArbiterStats {
        self.stats
    }

    #[must_use]
    pub fn door(&self) -> &DoorController {
        &self.door
    }

    pub fn door_mut(&mut self) -> &mut DoorController {
        &mut self.door
    }
}
