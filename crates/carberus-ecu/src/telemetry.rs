//! Aggregated counters of every condition the ECU absorbs.

use crate::arbiter::ArbiterStats;
use carberus_biometric::BiometricStats;
use carberus_core::EventCategory;
use carberus_door::DoorStats;
use carberus_token::TokenStatsSnapshot;
use serde::Serialize;
use tracing::info;

/// Control loop counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    pub ticks: u64,
    pub token_events: u64,
    pub biometric_events: u64,
    pub frames_captured: u64,
    pub capture_failures: u64,
    pub capture_timeouts: u64,
    pub panics: u64,
}

/// Point-in-time view of all ECU counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    pub tokens_accepted: u64,
    pub decrypt_errors: u64,
    pub length_rejections: u64,
    pub non_unlock_commands: u64,
    pub replay_rejections: u64,
    pub malformed_advertisements: u64,
    pub queue_stalls: u64,

    pub faces_evaluated: u64,
    pub faces_accepted: u64,
    pub recognition_errors: u64,
    pub capture_failures: u64,
    pub capture_timeouts: u64,

    pub unlocks_granted: u64,
    pub cooldown_rejections: u64,
    pub hardware_unavailable: u64,

    pub commands_sent: u64,
    pub unlock_acks: u64,
    pub lock_acks: u64,
    pub relock_timeouts: u64,
    pub ignored_status_lines: u64,
    pub link_losses: u64,

    pub ticks: u64,
    pub panics: u64,
}

impl TelemetrySnapshot {
    #[must_use]
    pub fn collect(
        tokens: TokenStatsSnapshot,
        biometric: BiometricStats,
        arbiter: ArbiterStats,
        door: DoorStats,
        control: LoopStats,
    ) -> Self {
        Self {
            tokens_accepted: tokens.accepted,
            decrypt_errors: tokens.decrypt_errors,
            length_rejections: tokens.length_rejections,
            non_unlock_commands: tokens.non_unlock_commands,
            replay_rejections: tokens.replay_rejections,
            malformed_advertisements: tokens.malformed_advertisements,
            queue_stalls: tokens.queue_stalls,

            faces_evaluated: biometric.faces_evaluated,
            faces_accepted: biometric.faces_accepted,
            recognition_errors: biometric.recognition_errors,
            capture_failures: control.capture_failures,
            capture_timeouts: control.capture_timeouts,

            unlocks_granted: arbiter.unlocks_granted,
            cooldown_rejections: arbiter.cooldown_rejections,
            hardware_unavailable: arbiter.hardware_unavailable,

            commands_sent: door.commands_sent,
            unlock_acks: door.unlock_acks,
            lock_acks: door.lock_acks,
            relock_timeouts: door.relock_timeouts,
            ignored_status_lines: door.ignored_lines,
            link_losses: door.link_losses,

            ticks: control.ticks,
            panics: control.panics,
        }
    }

    /// Emit the snapshot as one structured log event.
    pub fn log(&self) {
        info!(
            category = EventCategory::System.as_str(),
            tokens_accepted = self.tokens_accepted,
            decrypt_errors = self.decrypt_errors,
            length_rejections = self.length_rejections,
            non_unlock_commands = self.non_unlock_commands,
            replay_rejections = self.replay_rejections,
            malformed_advertisements = self.malformed_advertisements,
            queue_stalls = self.queue_stalls,
            faces_evaluated = self.faces_evaluated,
            faces_accepted = self.faces_accepted,
            recognition_errors = self.recognition_errors,
            capture_failures = self.capture_failures,
            capture_timeouts = self.capture_timeouts,
            unlocks_granted = self.unlocks_granted,
            cooldown_rejections = self.cooldown_rejections,
            hardware_unavailable = self.hardware_unavailable,
            commands_sent = self.commands_sent,
            unlock_acks = self.unlock_acks,
            lock_acks = self.lock_acks,
            relock_timeouts = self.relock_timeouts,
            ignored_status_lines = self.ignored_status_lines,
            link_losses = self.link_losses,
            ticks = self.ticks,
            panics = self.panics,
            "Telemetry snapshot"
        );
    }

    /// JSON rendering for the operator console.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
