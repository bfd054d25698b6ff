use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel an authentication event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthSource {
    /// Encrypted key fob advertisement.
    Token,
    /// Face match against the enrolled template store.
    Biometric,
}

impl AuthSource {
    /// Operator-facing name of the channel.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Token => "SMART KEY",
            Self::Biometric => "FACE ID",
        }
    }
}

impl fmt::Display for AuthSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Token => write!(f, "token"),
            Self::Biometric => write!(f, "biometric"),
        }
    }
}

/// A successful authentication on one channel.
///
/// Events are produced and consumed within a single tick of the control
/// loop; they are never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEvent {
    pub source: AuthSource,
    pub label: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl AuthEvent {
    #[must_use]
    pub fn new(source: AuthSource, label: Option<String>) -> Self {
        Self {
            source,
            label,
            timestamp: Local::now(),
        }
    }

    /// Event for an accepted key fob payload.
    #[must_use]
    pub fn token() -> Self {
        Self::new(AuthSource::Token, None)
    }

    /// Event for an accepted face, labelled with the matched identity.
    #[must_use]
    pub fn biometric(label: impl Into<String>) -> Self {
        Self::new(AuthSource::Biometric, Some(label.into()))
    }

    /// Human-readable description, e.g. `FACE ID (User1)`.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.label {
            Some(label) => format!("{} ({label})", self.source.display_name()),
            None => self.source.display_name().to_string(),
        }
    }
}

/// Connectivity of the door controller serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionState {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Scope of the anti-replay high-water mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayScope {
    /// One counter shared by every key fob.
    #[default]
    Global,
    /// One counter per 4-byte device id.
    PerDevice,
}

/// Category attached to every operational log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Connectivity,
    Token,
    Biometric,
    Security,
    System,
    Error,
}

impl EventCategory {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::Token => "token",
            Self::Biometric => "biometric",
            Self::Security => "security",
            Self::System => "system",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
