//! Token channel counters.
//!
//! The channel runs on the scanner task while the control loop reads the
//! counters for telemetry, so they are plain relaxed atomics behind an `Arc`.

use crate::TokenRejection;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, shared between the scanner task and telemetry.
#[derive(Debug, Default)]
pub struct TokenStats {
    accepted: AtomicU64,
    length_rejections: AtomicU64,
    decrypt_errors: AtomicU64,
    non_unlock_commands: AtomicU64,
    replay_rejections: AtomicU64,
    malformed_advertisements: AtomicU64,
    queue_stalls: AtomicU64,
}

/// Point-in-time copy of [`TokenStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenStatsSnapshot {
    pub accepted: u64,
    pub length_rejections: u64,
    pub decrypt_errors: u64,
    pub non_unlock_commands: u64,
    pub replay_rejections: u64,
    pub malformed_advertisements: u64,
    pub queue_stalls: u64,
}

impl TokenStats {
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, rejection: &TokenRejection) {
        let counter = match rejection {
            TokenRejection::InvalidLength { .. } => &self.length_rejections,
            TokenRejection::Decrypt { .. } => &self.decrypt_errors,
            TokenRejection::UnsupportedCommand { .. } => &self.non_unlock_commands,
            TokenRejection::Replay { .. } => &self.replay_rejections,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_advertisement(&self) {
        self.malformed_advertisements.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_stall(&self) {
        self.queue_stalls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TokenStatsSnapshot {
        TokenStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            length_rejections: self.length_rejections.load(Ordering::Relaxed),
            decrypt_errors: self.decrypt_errors.load(Ordering::Relaxed),
            non_unlock_commands: self.non_unlock_commands.load(Ordering::Relaxed),
            replay_rejections: self.replay_rejections.load(Ordering::Relaxed),
            malformed_advertisements: self.malformed_advertisements.load(Ordering::Relaxed),
            queue_stalls: self.queue_stalls.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_land_in_distinct_counters() {
        let stats = TokenStats::default();

        stats.record_rejection(&TokenRejection::InvalidLength {
            expected: 16,
            actual: 3,
        });
        stats.record_rejection(&TokenRejection::decrypt("x"));
        stats.record_rejection(&TokenRejection::UnsupportedCommand { command: 0 });
        stats.record_rejection(&TokenRejection::Replay {
            counter: 1,
            last_seen: 1,
        });
        stats.record_rejection(&TokenRejection::Replay {
            counter: 0,
            last_seen: 1,
        });
        stats.record_accepted();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.length_rejections, 1);
        assert_eq!(snapshot.decrypt_errors, 1);
        assert_eq!(snapshot.non_unlock_commands, 1);
        assert_eq!(snapshot.replay_rejections, 2);
        assert_eq!(snapshot.accepted, 1);
        assert_eq!(snapshot.queue_stalls, 0);
    }
}
