//! Hardware device trait definitions.
//!
//! These traits are the contract between the ECU core and its peripherals,
//! allowing the door controller link and the camera to be swapped between
//! real devices and mocks.
//!
//! [`DoorLink`] uses native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT). [`Camera`] is deliberately synchronous: capture is a blocking
//! call that the control loop runs on the blocking pool under a deadline.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::{DeviceInfo, Frame};
use std::io::Read;

/// Blocking byte source for inbound serial data.
///
/// Implementations should return `ErrorKind::TimedOut` or
/// `ErrorKind::WouldBlock` when no data arrived within their poll interval,
/// and `Ok(0)` once the link is gone.
pub type LinkReader = Box<dyn Read + Send>;

/// Line-oriented link to the door controller.
///
/// # Object Safety and Dynamic Dispatch
///
/// This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generics, or the [`AnyDoorLink`](crate::devices::AnyDoorLink)
/// enum wrapper for concrete dispatch.
///
/// # Examples
///
/// ```no_run
/// use carberus_hardware::traits::DoorLink;
/// use carberus_hardware::error::Result;
///
/// async fn unlock<L: DoorLink>(link: &mut L) -> Result<()> {
///     link.send_line("CMD_UNLOCK").await
/// }
/// ```
pub trait DoorLink: Send {
    /// Write one line; the implementation appends the terminator.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is closed or the write fails.
    async fn send_line(&mut self, line: &str) -> Result<()>;

    /// Independent reader over the inbound half of the link.
    ///
    /// Returns `Ok(None)` if the link has no inbound direction.
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be duplicated.
    fn try_reader(&mut self) -> Result<Option<LinkReader>>;

    /// Release the underlying device. Further sends fail.
    async fn close(&mut self) -> Result<()>;

    /// Device metadata.
    fn info(&self) -> DeviceInfo;
}

/// Frame source.
///
/// # Examples
///
/// ```no_run
/// use carberus_hardware::traits::Camera;
///
/// fn grab<C: Camera>(camera: &mut C) {
///     match camera.capture() {
///         Ok(Some(frame)) => println!("{}x{}", frame.width(), frame.height()),
///         Ok(None) => println!("no frame"),
///         Err(e) => eprintln!("capture failed: {e}"),
///     }
/// }
/// ```
pub trait Camera: Send + 'static {
    /// Capture one frame, blocking until it is available.
    ///
    /// Returns `Ok(None)` when the device produced no frame this time.
    ///
    /// # Errors
    ///
    /// Returns an error if the device failed.
    fn capture(&mut self) -> Result<Option<Frame>>;

    /// Release the device. Further captures fail.
    fn release(&mut self);

    /// Device metadata.
    fn info(&self) -> DeviceInfo;
}
