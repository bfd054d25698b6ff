//! Serial link to the door controller.
//!
//! The BCM enumerates as a USB CDC-ACM or USB-serial device. The ECU probes a
//! short ordered list of device nodes at startup and opens the first one that
//! exists. There is no reconnection: a link lost mid-session stays lost until
//! the process restarts.

use crate::error::{HardwareError, Result};
use crate::traits::{DoorLink, LinkReader};
use crate::types::DeviceInfo;
use carberus_core::EventCategory;
use serialport::SerialPort;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Poll interval of the inbound reader; bounds how long closing takes.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// First candidate path that exists on this host.
///
/// # Examples
///
/// ```
/// use carberus_hardware::serial::probe_candidates;
/// use std::path::PathBuf;
///
/// let candidates = [PathBuf::from("/definitely/not/here"), std::env::temp_dir()];
/// assert_eq!(probe_candidates(&candidates), Some(std::env::temp_dir().as_path()));
/// ```
pub fn probe_candidates(candidates: &[PathBuf]) -> Option<&Path> {
    candidates
        .iter()
        .find(|path| path.exists())
        .map(PathBuf::as_path)
}

/// Door controller reached over a serial port.
pub struct SerialDoorLink {
    path: PathBuf,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialDoorLink {
    /// Open the port at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be opened or configured.
    pub fn open(path: impl Into<PathBuf>, baud_rate: u32) -> Result<Self> {
        let path = path.into();
        debug!(
            category = EventCategory::Connectivity.as_str(),
            path = %path.display(),
            baud_rate,
            "Opening serial port"
        );

        let port = serialport::new(path.to_string_lossy(), baud_rate)
            .timeout(READ_POLL_INTERVAL)
            .open()?;

        info!(
            category = EventCategory::Connectivity.as_str(),
            path = %path.display(),
            baud_rate,
            "Serial port opened"
        );
        Ok(Self {
            path,
            baud_rate,
            port: Some(port),
        })
    }

    /// Open the first existing candidate.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::NotFound`] if no candidate exists, or the
    /// open error of the first existing one.
    pub fn autodetect(candidates: &[PathBuf], baud_rate: u32) -> Result<Self> {
        let path = probe_candidates(candidates).ok_or_else(|| {
            let tried = candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            HardwareError::not_found(tried)
        })?;

        Self::open(path, baud_rate)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl std::fmt::Debug for SerialDoorLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialDoorLink")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.is_open())
            .finish()
    }
}

impl DoorLink for SerialDoorLink {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| HardwareError::disconnected(self.path.display().to_string()))?;

        port.write_all(line.as_bytes())?;
        port.write_all(b"\n")?;
        port.flush()?;
        Ok(())
    }

    fn try_reader(&mut self) -> Result<Option<LinkReader>> {
        let port = self
            .port
            .as_ref()
            .ok_or_else(|| HardwareError::disconnected(self.path.display().to_string()))?;

        let reader = port.try_clone()?;
        Ok(Some(Box::new(reader)))
    }

    async fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            info!(
            category = EventCategory::Connectivity.as_str(),
            path = %self.path.display(),
            "Serial port closed"
        );
        }
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new("BCM", self.path.display().to_string()).with_baud_rate(self.baud_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_prefers_earlier_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("ttyACM0");
        let second = dir.path().join("ttyUSB0");
        std::fs::write(&first, b"").unwrap();
        std::fs::write(&second, b"").unwrap();

        let candidates = [first.clone(), second];
        assert_eq!(probe_candidates(&candidates), Some(first.as_path()));
    }

    #[test]
    fn test_probe_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("ttyACM0");
        let present = dir.path().join("ttyUSB0");
        std::fs::write(&present, b"").unwrap();

        let candidates = [missing, present.clone()];
        assert_eq!(probe_candidates(&candidates), Some(present.as_path()));
    }

    #[test]
    fn test_probe_none_exist() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = [dir.path().join("a"), dir.path().join("b")];
        assert_eq!(probe_candidates(&candidates), None);
    }

    #[test]
    fn test_autodetect_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = [dir.path().join("ttyACM0")];

        let result = SerialDoorLink::autodetect(&candidates, 9600);
        assert!(matches!(result, Err(HardwareError::NotFound { .. })));
    }
}
