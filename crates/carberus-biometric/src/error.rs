//! Per-face recognition faults.

/// Result type alias for detector and recognizer calls.
pub type Result<T> = std::result::Result<T, RecognitionError>;

/// A fault while evaluating one frame or one face.
///
/// These never escalate past [`BiometricChannel::poll`](crate::BiometricChannel::poll):
/// the face is skipped and the fault is counted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecognitionError {
    /// Face detection failed for the whole frame.
    #[error("Detector error: {message}")]
    Detector { message: String },

    /// Scoring failed for one face.
    #[error("Scorer error: {message}")]
    Scorer { message: String },

    /// The detector returned a region that does not fit the frame.
    #[error("Invalid face region: {message}")]
    InvalidRegion { message: String },
}

impl RecognitionError {
    pub fn detector(message: impl Into<String>) -> Self {
        Self::Detector {
            message: message.into(),
        }
    }

    pub fn scorer(message: impl Into<String>) -> Self {
        Self::Scorer {
            message: message.into(),
        }
    }

    pub fn invalid_region(message: impl Into<String>) -> Self {
        Self::InvalidRegion {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            RecognitionError::scorer("no templates").to_string(),
            "Scorer error: no templates"
        );
        assert_eq!(
            RecognitionError::detector("bad frame").to_string(),
            "Detector error: bad frame"
        );
    }
}
