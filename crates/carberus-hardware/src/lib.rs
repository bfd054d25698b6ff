//! Hardware device abstraction layer for the Carberus ECU.
//!
//! This crate provides the abstractions for the two physical peripherals the
//! ECU drives directly: the door controller (BCM) behind a serial link, and
//! the cabin camera feeding face recognition. Each comes with a real
//! implementation and a mock for development and testing.
//!
//! # Device Traits
//!
//! ## Door Link
//!
//! The [`DoorLink`] trait is a line-oriented, bidirectional link:
//!
//! ```no_run
//! use carberus_hardware::traits::DoorLink;
//! use carberus_hardware::error::Result;
//!
//! async fn unlock<L: DoorLink>(link: &mut L) -> Result<()> {
//!     link.send_line("CMD_UNLOCK").await
//! }
//! ```
//!
//! ## Camera
//!
//! The [`Camera`] trait is a blocking frame source. Callers that must stay
//! responsive run it on a blocking thread with a deadline:
//!
//! ```no_run
//! use carberus_hardware::traits::Camera;
//! use carberus_hardware::Frame;
//! use carberus_hardware::error::Result;
//!
//! fn grab<C: Camera>(camera: &mut C) -> Result<Option<Frame>> {
//!     camera.capture()
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] using [`HardwareError`].
//! [`HardwareError::is_connection_loss`] tells a transient fault from a link
//! that is gone for good.
//!
//! # Mock Implementations
//!
//! [`mock::MockDoorLink`] and [`mock::MockCamera`] come with handles that
//! script their behavior from tests.
//!
//! [`DoorLink`]: traits::DoorLink
//! [`Camera`]: traits::Camera

pub mod camera;
pub mod devices;
pub mod error;
pub mod mock;
pub mod serial;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use devices::{AnyCamera, AnyDoorLink};
pub use error::{HardwareError, Result};
pub use traits::{Camera, DoorLink, LinkReader};
pub use types::{DeviceInfo, Frame, Region};
