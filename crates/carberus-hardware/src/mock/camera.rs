//! Mock camera implementation for testing and development.
//!
//! Frames, failures and slow captures are queued through a handle and
//! returned by successive `capture()` calls. An empty queue yields no frame.

use crate::{
    HardwareError, Result,
    traits::Camera,
    types::{DeviceInfo, Frame},
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted outcome of one capture.
#[derive(Debug, Clone)]
enum MockCapture {
    Frame(Frame),
    Delayed(Duration, Frame),
    Error(String),
}

#[derive(Debug, Default)]
struct SharedState {
    queue: Mutex<VecDeque<MockCapture>>,
    released: AtomicBool,
    captures: AtomicU64,
}

/// Mock camera.
///
/// # Examples
///
/// ```
/// use carberus_hardware::mock::MockCamera;
/// use carberus_hardware::traits::Camera;
/// use carberus_hardware::types::Frame;
///
/// let (mut camera, handle) = MockCamera::new();
/// handle.queue_frame(Frame::filled(4, 4, 128));
///
/// assert!(camera.capture().unwrap().is_some());
/// assert!(camera.capture().unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct MockCamera {
    name: String,
    state: Arc<SharedState>,
}

impl MockCamera {
    /// Create a new mock camera and its control handle.
    pub fn new() -> (Self, MockCameraHandle) {
        Self::with_name("Mock Camera".to_string())
    }

    /// Create a new mock camera with a custom name.
    pub fn with_name(name: String) -> (Self, MockCameraHandle) {
        let state = Arc::new(SharedState::default());
        let camera = Self {
            name,
            state: Arc::clone(&state),
        };
        (camera, MockCameraHandle { state })
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new().0
    }
}

impl Camera for MockCamera {
    fn capture(&mut self) -> Result<Option<Frame>> {
        if self.state.released.load(Ordering::SeqCst) {
            return Err(HardwareError::disconnected(self.name.clone()));
        }
        self.state.captures.fetch_add(1, Ordering::SeqCst);

        let next = self
            .state
            .queue
            .lock()
            .map_err(|_| HardwareError::capture("mock state poisoned"))?
            .pop_front();

        match next {
            None => Ok(None),
            Some(MockCapture::Frame(frame)) => Ok(Some(frame)),
            Some(MockCapture::Delayed(delay, frame)) => {
                std::thread::sleep(delay);
                Ok(Some(frame))
            }
            Some(MockCapture::Error(message)) => Err(HardwareError::capture(message)),
        }
    }

    fn release(&mut self) {
        self.state.released.store(true, Ordering::SeqCst);
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.name.clone(), "Mock Camera v1.0")
    }
}

/// Handle for scripting a mock camera.
#[derive(Debug, Clone)]
pub struct MockCameraHandle {
    state: Arc<SharedState>,
}

impl MockCameraHandle {
    fn push(&self, capture: MockCapture) {
        if let Ok(mut queue) = self.state.queue.lock() {
            queue.push_back(capture);
        }
    }

    /// Queue a frame for the next capture.
    pub fn queue_frame(&self, frame: Frame) {
        self.push(MockCapture::Frame(frame));
    }

    /// Queue a frame that takes `delay` to capture.
    pub fn queue_delayed_frame(&self, delay: Duration, frame: Frame) {
        self.push(MockCapture::Delayed(delay, frame));
    }

    /// Queue a capture failure.
    pub fn queue_error(&self, message: impl Into<String>) {
        self.push(MockCapture::Error(message.into()));
    }

    /// Number of scripted captures not consumed yet.
    pub fn pending(&self) -> usize {
        self.state.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Number of `capture()` calls made so far.
    pub fn capture_count(&self) -> u64 {
        self.state.captures.load(Ordering::SeqCst)
    }

    /// Whether the ECU released the camera.
    pub fn is_released(&self) -> bool {
        self.state.released.load(Ordering::SeqCst)
    }
}
