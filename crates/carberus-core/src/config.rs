//! ECU configuration.
//!
//! The configuration is read from a TOML file. Every field has a default
//! matching the firmware contract in [`constants`](crate::constants), so an
//! absent file yields a working configuration and a partial file only needs
//! the entries it overrides.
//!
//! ```toml
//! [serial]
//! candidates = ["/dev/ttyACM0", "/dev/ttyUSB0"]
//! baud_rate = 9600
//!
//! [token]
//! key = "000102030405060708090a0b0c0d0e0f"
//! manufacturer_id = 0xFFFF
//! replay_scope = "global"
//!
//! [biometric]
//! template_path = "trainer.json"
//! distance_threshold = 60.0
//!
//! [timing]
//! tick_ms = 50
//! cooldown_ms = 5000
//! ```

use crate::constants::*;
use crate::{Error, ReplayScope, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level ECU configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EcuConfig {
    pub serial: SerialConfig,
    pub token: TokenConfig,
    pub biometric: BiometricConfig,
    pub camera: CameraConfig,
    pub timing: TimingConfig,
}

/// Door controller serial link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device paths probed in order; the first existing one wins.
    pub candidates: Vec<PathBuf>,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            candidates: SERIAL_CANDIDATES.iter().map(PathBuf::from).collect(),
            baud_rate: SERIAL_BAUD_RATE,
        }
    }
}

/// Key fob channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Pre-shared AES-128 key as 32 hex digits.
    pub key: String,
    pub manufacturer_id: u16,
    pub replay_scope: ReplayScope,
    /// When set, replay high-water marks survive restarts.
    pub replay_state_path: Option<PathBuf>,
    pub queue_capacity: usize,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            key: hex::encode(DEFAULT_TOKEN_KEY),
            manufacturer_id: DEFAULT_MANUFACTURER_ID,
            replay_scope: ReplayScope::Global,
            replay_state_path: None,
            queue_capacity: DEFAULT_TOKEN_QUEUE_CAPACITY,
        }
    }
}

impl TokenConfig {
    /// Decode the configured key.
    ///
    /// # Errors
    /// Returns `Error::InvalidKey` unless the key is exactly 32 hex digits.
    pub fn key_bytes(&self) -> Result<[u8; TOKEN_KEY_LEN]> {
        let bytes = hex::decode(self.key.trim())
            .map_err(|e| Error::InvalidKey(format!("not valid hex: {e}")))?;
        bytes.try_into().map_err(|bytes: Vec<u8>| {
            Error::InvalidKey(format!(
                "expected {TOKEN_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })
    }
}

/// Face recognition channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiometricConfig {
    /// Enrolled template store; the channel is disabled when it is missing.
    pub template_path: PathBuf,
    pub distance_threshold: f64,
    /// Identity labels indexed by identity id.
    pub labels: Vec<String>,
}

impl Default for BiometricConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from(DEFAULT_TEMPLATE_PATH),
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            labels: DEFAULT_IDENTITY_LABELS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Camera capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub device: PathBuf,
    pub width: u32,
    pub height: u32,
    pub capture_timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_CAMERA_DEVICE),
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            capture_timeout_ms: DEFAULT_CAPTURE_TIMEOUT_MS,
        }
    }
}

impl CameraConfig {
    #[must_use]
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

/// Control loop timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_ms: u64,
    pub cooldown_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl EcuConfig {
    /// Load the configuration from `path`.
    ///
    /// A missing file is not an error: the defaults are returned.
    ///
    /// # Errors
    /// Returns `Error::Config` if the file exists but cannot be parsed or
    /// fails [`validate`](Self::validate), and `Error::Io` if it cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    ///
    /// # Errors
    /// Returns `Error::Config` on malformed TOML or invalid values.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: EcuConfig =
            toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants serde cannot express.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        self.token.key_bytes()?;

        if self.token.queue_capacity == 0 {
            return Err(Error::Config(
                "token.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.timing.tick_ms == 0 {
            return Err(Error::Config(
                "timing.tick_ms must be greater than zero".to_string(),
            ));
        }
        if self.serial.baud_rate == 0 {
            return Err(Error::Config(
                "serial.baud_rate must be greater than zero".to_string(),
            ));
        }
        if !self.biometric.distance_threshold.is_finite() {
            return Err(Error::Config(
                "biometric.distance_threshold must be finite".to_string(),
            ));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::Config(
                "camera dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
