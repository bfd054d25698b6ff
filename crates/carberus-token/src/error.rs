//! Token rejection classification.

use carberus_core::EventCategory;

/// Reason a token payload did not produce an authentication event.
///
/// None of these are faults of the ECU itself: they are dropped at the
/// channel boundary and only counted. [`TokenRejection::Replay`] is the one
/// security-relevant case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    /// Payload is not exactly one cipher block; never decrypted.
    #[error("Invalid payload length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Payload could not be decrypted.
    #[error("Decrypt error: {reason}")]
    Decrypt { reason: String },

    /// Decrypted packet carries a command other than unlock.
    #[error("Unsupported command: {command:#04x}")]
    UnsupportedCommand { command: u8 },

    /// Counter is not above the last accepted one.
    #[error("Replay rejected: counter {counter} <= last seen {last_seen}")]
    Replay { counter: u32, last_seen: u32 },
}

impl TokenRejection {
    /// Create a new decrypt error.
    pub fn decrypt(reason: impl Into<String>) -> Self {
        Self::Decrypt {
            reason: reason.into(),
        }
    }

    /// Log category for this rejection.
    pub fn category(&self) -> EventCategory {
        match self {
            Self::Replay { .. } => EventCategory::Security,
            _ => EventCategory::Token,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, Self::Replay { .. })
    }
}
