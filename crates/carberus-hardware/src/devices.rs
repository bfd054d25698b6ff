//! Enum wrappers for hardware device dispatch.
//!
//! Native `async fn` in traits (RPITIT, Edition 2024) is not object-safe, so
//! `Box<dyn DoorLink>` is not an option. These enums provide concrete type
//! dispatch instead, which keeps the door controller and the control loop
//! free of generic parameters.
//!
//! # Examples
//!
//! ```
//! use carberus_hardware::devices::AnyDoorLink;
//! use carberus_hardware::mock::MockDoorLink;
//!
//! let (link, _handle) = MockDoorLink::new();
//! let any_link = AnyDoorLink::Mock(link);
//! ```

use crate::camera::DeviceCamera;
use crate::mock::{MockCamera, MockDoorLink};
use crate::serial::SerialDoorLink;
use crate::traits::{Camera, DoorLink, LinkReader};
use crate::{DeviceInfo, Frame, Result};

/// Enum wrapper for door controller link dispatch.
///
/// # Examples
///
/// ```
/// use carberus_hardware::devices::AnyDoorLink;
/// use carberus_hardware::traits::DoorLink;
/// use carberus_hardware::mock::MockDoorLink;
///
/// #[tokio::main]
/// async fn main() -> carberus_hardware::Result<()> {
///     let (link, handle) = MockDoorLink::new();
///     let mut any_link = AnyDoorLink::Mock(link);
///
///     any_link.send_line("CMD_UNLOCK").await?;
///     assert_eq!(handle.sent_count(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyDoorLink {
    /// BCM on a serial port.
    Serial(SerialDoorLink),

    /// Mock link for development and testing.
    Mock(MockDoorLink),
}

impl DoorLink for AnyDoorLink {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        match self {
            Self::Serial(link) => link.send_line(line).await,
            Self::Mock(link) => link.send_line(line).await,
        }
    }

    fn try_reader(&mut self) -> Result<Option<LinkReader>> {
        match self {
            Self::Serial(link) => link.try_reader(),
            Self::Mock(link) => link.try_reader(),
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Serial(link) => link.close().await,
            Self::Mock(link) => link.close().await,
        }
    }

    fn info(&self) -> DeviceInfo {
        match self {
            Self::Serial(link) => link.info(),
            Self::Mock(link) => link.info(),
        }
    }
}

impl From<SerialDoorLink> for AnyDoorLink {
    fn from(link: SerialDoorLink) -> Self {
        Self::Serial(link)
    }
}

impl From<MockDoorLink> for AnyDoorLink {
    fn from(link: MockDoorLink) -> Self {
        Self::Mock(link)
    }
}

/// Enum wrapper for camera dispatch.
///
/// # Examples
///
/// ```
/// use carberus_hardware::devices::AnyCamera;
/// use carberus_hardware::traits::Camera;
/// use carberus_hardware::mock::MockCamera;
///
/// let (camera, _handle) = MockCamera::new();
/// let any_camera = AnyCamera::Mock(camera);
/// assert_eq!(any_camera.info().name, "Mock Camera");
/// ```
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyCamera {
    /// Raw grayscale device node.
    Device(DeviceCamera),

    /// Mock camera for development and testing.
    Mock(MockCamera),
}

impl Camera for AnyCamera {
    fn capture(&mut self) -> Result<Option<Frame>> {
        match self {
            Self::Device(camera) => camera.capture(),
            Self::Mock(camera) => camera.capture(),
        }
    }

    fn release(&mut self) {
        match self {
            Self::Device(camera) => camera.release(),
            Self::Mock(camera) => camera.release(),
        }
    }

    fn info(&self) -> DeviceInfo {
        match self {
            Self::Device(camera) => camera.info(),
            Self::Mock(camera) => camera.info(),
        }
    }
}

impl From<DeviceCamera> for AnyCamera {
    fn from(camera: DeviceCamera) -> Self {
        Self::Device(camera)
    }
}

impl From<MockCamera> for AnyCamera {
    fn from(camera: MockCamera) -> Self {
        Self::Mock(camera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_any_door_link_mock() {
        let (link, handle) = MockDoorLink::new();
        let mut any_link = AnyDoorLink::from(link);

        any_link.send_line("CMD_UNLOCK").await.unwrap();
        assert_eq!(handle.sent_lines(), vec!["CMD_UNLOCK".to_string()]);
        assert_eq!(any_link.info().name, "Mock BCM");

        any_link.close().await.unwrap();
        assert!(handle.is_closed());
    }

    #[test]
    fn test_any_camera_mock() {
        let (camera, handle) = MockCamera::new();
        let mut any_camera = AnyCamera::from(camera);

        handle.queue_frame(Frame::filled(3, 3, 7));
        assert_eq!(any_camera.capture().unwrap(), Some(Frame::filled(3, 3, 7)));

        any_camera.release();
        assert!(handle.is_released());
    }
}
