//! Raw grayscale camera.
//!
//! Reads fixed-size 8-bit grayscale frames straight from a device node
//! configured for read() I/O (for example a V4L2 device set to `GREY` at the
//! configured resolution), or from any file or FIFO producing the same
//! stream.

use crate::error::{HardwareError, Result};
use crate::traits::Camera;
use crate::types::{DeviceInfo, Frame};
use carberus_core::EventCategory;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::info;

/// Camera backed by a device node.
#[derive(Debug)]
pub struct DeviceCamera {
    path: PathBuf,
    width: u32,
    height: u32,
    device: Option<File>,
}

impl DeviceCamera {
    /// Open the device.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::NotFound`] if the node does not exist and
    /// [`HardwareError::InitializationFailed`] if it cannot be opened.
    pub fn open(path: impl Into<PathBuf>, width: u32, height: u32) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(HardwareError::not_found(path.display().to_string()));
        }
        if width == 0 || height == 0 {
            return Err(HardwareError::initialization_failed(format!(
                "invalid frame size {width}x{height}"
            )));
        }

        let device = File::open(&path).map_err(|e| {
            HardwareError::initialization_failed(format!("{}: {e}", path.display()))
        })?;

        info!(
            category = EventCategory::Biometric.as_str(),
            path = %path.display(),
            width,
            height,
            "Camera opened"
        );
        Ok(Self {
            path,
            width,
            height,
            device: Some(device),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Camera for DeviceCamera {
    fn capture(&mut self) -> Result<Option<Frame>> {
        let len = self.frame_len();
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| HardwareError::disconnected(self.path.display().to_string()))?;

        let mut pixels = vec![0u8; len];
        match device.read_exact(&mut pixels) {
            Ok(()) => Frame::new(self.width, self.height, pixels).map(Some),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(HardwareError::capture(e.to_string())),
        }
    }

    fn release(&mut self) {
        if self.device.take().is_some() {
            info!(
            category = EventCategory::Biometric.as_str(),
            path = %self.path.display(),
            "Camera released"
        );
        }
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new("Camera", self.path.display().to_string())
    }
}
