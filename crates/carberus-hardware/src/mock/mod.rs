//! Mock device implementations for testing and development.
//!
//! This module provides simulated devices that can be controlled
//! programmatically without requiring physical hardware.

pub mod camera;
pub mod door;

// Re-export commonly used types
pub use camera::{MockCamera, MockCameraHandle};
pub use door::{MockDoorHandle, MockDoorLink};
