//! Token validation pipeline.

use crate::replay::StateWrite;
use crate::{ReplayGuard, TokenCipher, TokenRejection, TokenStats};
use carberus_core::constants::TOKEN_PAYLOAD_LEN;
use carberus_core::{AuthEvent, EventCategory, ReplayScope};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Validates key fob payloads and owns the anti-replay state.
///
/// The channel is the single writer of its [`ReplayGuard`]: it is meant to
/// live on exactly one task and hand accepted events to the control loop
/// through a queue.
#[derive(Debug)]
pub struct TokenChannel {
    cipher: TokenCipher,
    replay: ReplayGuard,
    stats: Arc<TokenStats>,
}

impl TokenChannel {
    /// Channel with in-memory replay state.
    pub fn new(cipher: TokenCipher, scope: ReplayScope) -> Self {
        Self::with_replay_guard(cipher, ReplayGuard::new(scope))
    }

    pub fn with_replay_guard(cipher: TokenCipher, replay: ReplayGuard) -> Self {
        Self {
            cipher,
            replay,
            stats: Arc::new(TokenStats::default()),
        }
    }

    /// Counters shared with telemetry.
    pub fn stats(&self) -> Arc<TokenStats> {
        Arc::clone(&self.stats)
    }

    pub fn replay_guard(&self) -> &ReplayGuard {
        &self.replay
    }

    /// Replay state write owed after accepted tokens; see
    /// [`ReplayGuard::take_pending_write`].
    ///
    /// # Errors
    ///
    /// Returns `Error::ReplayState` if the state cannot be serialized.
    pub fn take_pending_write(&mut self) -> carberus_core::Result<Option<StateWrite>> {
        self.replay.take_pending_write()
    }

    /// Run the full validation pipeline on one payload.
    ///
    /// Checks happen in order: length, decryption, command, replay. Only an
    /// accepted packet advances the replay state.
    ///
    /// # Errors
    ///
    /// Returns the [`TokenRejection`] of the first failing check.
    pub fn validate(&mut self, payload: &[u8]) -> Result<AuthEvent, TokenRejection> {
        if payload.len() != TOKEN_PAYLOAD_LEN {
            return Err(TokenRejection::InvalidLength {
                expected: TOKEN_PAYLOAD_LEN,
                actual: payload.len(),
            });
        }

        let packet = self.cipher.open(payload)?;
        if !packet.is_unlock() {
            return Err(TokenRejection::UnsupportedCommand {
                command: packet.command,
            });
        }

        self.replay
            .check_and_advance(&packet.device_id, packet.counter)?;

        info!(
            category = EventCategory::Token.as_str(),
            counter = packet.counter,
            device = %packet.device_hex(),
            "Verified key fob signal"
        );
        Ok(AuthEvent::token())
    }

    /// Validate one payload, recording and logging the outcome.
    ///
    /// Rejections are never propagated: they are counted in [`TokenStats`]
    /// and logged under their category.
    pub fn ingest(&mut self, payload: &[u8]) -> Option<AuthEvent> {
        match self.validate(payload) {
            Ok(event) => {
                self.stats.record_accepted();
                Some(event)
            }
            Err(rejection) => {
                self.stats.record_rejection(&rejection);
                if rejection.is_replay() {
                    warn!(
                        category = rejection.category().as_str(),
                        "Replay attack blocked: {}", rejection
                    );
                } else {
                    debug!(
                        category = rejection.category().as_str(),
                        "Token payload dropped: {}", rejection
                    );
                }
                None
            }
        }
    }
}
