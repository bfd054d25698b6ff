//! Seams to the face detection and matching backends.
//!
//! Both traits are synchronous: they run inside the control loop tick right
//! after the frame arrives. They are object-safe so the loop can hold any
//! backend as a `Box<dyn ...>`.

use crate::error::Result;
use carberus_hardware::{Frame, Region};

/// Outcome of matching one face against the enrolled identities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Best-matching enrolled identity.
    pub identity: u32,
    /// Dissimilarity to that identity; lower is better.
    pub distance: f64,
}

impl Score {
    #[must_use]
    pub fn new(identity: u32, distance: f64) -> Self {
        Self { identity, distance }
    }
}

/// Locates candidate faces in a frame.
pub trait FaceDetector: Send {
    /// Zero or more face regions, each inside the frame bounds.
    ///
    /// # Errors
    ///
    /// Returns [`RecognitionError::Detector`](crate::RecognitionError::Detector)
    /// if the frame cannot be processed.
    fn detect(&self, frame: &Frame) -> Result<Vec<Region>>;
}

/// Scores a cropped face against the template store.
pub trait Recognizer: Send {
    /// # Errors
    ///
    /// Returns [`RecognitionError::Scorer`](crate::RecognitionError::Scorer)
    /// if the face cannot be scored.
    fn score(&self, face: &Frame) -> Result<Score>;
}
