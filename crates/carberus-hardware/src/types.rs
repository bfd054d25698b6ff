//! Common types shared across hardware device implementations.
//!
//! This module defines device metadata and the grayscale frame type produced
//! by cameras and consumed by the biometric channel.

use crate::{HardwareError, Result};
use serde::{Deserialize, Serialize};

/// Generic device information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "BCM", "MockCamera").
    pub name: String,

    /// Device path or model identifier.
    pub model: String,

    /// Optional link speed, for serial devices.
    pub baud_rate: Option<u32>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            baud_rate: None,
        }
    }

    /// Set the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }
}

/// Rectangular area of a frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// 8-bit grayscale image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    /// Wrap raw pixels.
    ///
    /// # Errors
    ///
    /// Returns an error if `pixels.len()` is not `width * height`.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(HardwareError::invalid_data(format!(
                "Frame {width}x{height} needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Frame filled with one intensity.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Region covering the whole frame.
    pub fn bounds(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }

    /// Copy out a sub-image.
    ///
    /// # Errors
    ///
    /// Returns an error if the region is empty or extends past the frame.
    pub fn crop(&self, region: &Region) -> Result<Frame> {
        let fits_x = region.x.checked_add(region.width).is_some_and(|r| r <= self.width);
        let fits_y = region.y.checked_add(region.height).is_some_and(|b| b <= self.height);
        if region.area() == 0 || !fits_x || !fits_y {
            return Err(HardwareError::invalid_data(format!(
                "Region {region:?} outside {}x{} frame",
                self.width, self.height
            )));
        }

        let mut pixels = Vec::with_capacity(region.area() as usize);
        for row in region.y..region.y + region.height {
            let start = row as usize * self.width as usize + region.x as usize;
            pixels.extend_from_slice(&self.pixels[start..start + region.width as usize]);
        }

        Ok(Frame {
            width: region.width,
            height: region.height,
            pixels,
        })
    }
}
