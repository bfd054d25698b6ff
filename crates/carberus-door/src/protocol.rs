//! BCM serial line protocol.
//!
//! ASCII, one message per newline-terminated line. The ECU sends a single
//! command; the BCM reports lock transitions and auto-relock.

use carberus_core::constants::{ACK_LOCKED, ACK_UNLOCKED, CMD_UNLOCK, STATUS_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorCommand {
    Unlock,
}

impl DoorCommand {
    /// Wire text without the terminator.
    #[must_use]
    pub fn as_line(&self) -> &'static str {
        match self {
            Self::Unlock => CMD_UNLOCK,
        }
    }
}

impl fmt::Display for DoorCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_line())
    }
}

/// Inbound status notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorStatus {
    /// `ACK:UNLOCKED`
    Unlocked,
    /// `ACK:LOCKED`
    Locked,
    /// `STATUS:TIMEOUT`, the BCM relocked on its own.
    RelockTimeout,
}

impl DoorStatus {
    /// Parse one line. Surrounding whitespace (including a trailing `\r`)
    /// is ignored; unrecognised lines yield `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use carberus_door::DoorStatus;
    ///
    /// assert_eq!(DoorStatus::parse_line("ACK:UNLOCKED\r"), Some(DoorStatus::Unlocked));
    /// assert_eq!(DoorStatus::parse_line("BOOT v2.1"), None);
    /// ```
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        match line.trim() {
            ACK_UNLOCKED => Some(Self::Unlocked),
            ACK_LOCKED => Some(Self::Locked),
            STATUS_TIMEOUT => Some(Self::RelockTimeout),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_line(&self) -> &'static str {
        match self {
            Self::Unlocked => ACK_UNLOCKED,
            Self::Locked => ACK_LOCKED,
            Self::RelockTimeout => STATUS_TIMEOUT,
        }
    }
}

impl fmt::Display for DoorStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unlocked => write!(f, "door unlocked"),
            Self::Locked => write!(f, "door locked"),
            Self::RelockTimeout => write!(f, "auto-relock timeout"),
        }
    }
}
