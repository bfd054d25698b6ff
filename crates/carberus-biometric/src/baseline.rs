//! Baseline detection and matching backend.
//!
//! [`FullFrameDetector`] treats the whole frame as one face, which suits a
//! camera mounted to frame the driver's face tightly. [`HistogramRecognizer`]
//! compares grey-level histograms against the template store. Both can be
//! replaced through the [`FaceDetector`] and [`Recognizer`] traits.

use crate::error::{RecognitionError, Result};
use crate::histogram::Histogram;
use crate::templates::TemplateStore;
use crate::traits::{FaceDetector, Recognizer, Score};
use carberus_hardware::{Frame, Region};

/// One region covering the whole frame; none for an empty frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullFrameDetector;

impl FaceDetector for FullFrameDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Region>> {
        let bounds = frame.bounds();
        if bounds.area() == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![bounds])
    }
}

/// Nearest-template matcher over intensity histograms.
#[derive(Debug, Clone)]
pub struct HistogramRecognizer {
    store: TemplateStore,
}

impl HistogramRecognizer {
    #[must_use]
    pub fn new(store: TemplateStore) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &TemplateStore {
        &self.store
    }
}

impl Recognizer for HistogramRecognizer {
    fn score(&self, face: &Frame) -> Result<Score> {
        let histogram = Histogram::of(face);

        self.store
            .iter()
            .map(|template| Score::new(template.identity, histogram.distance(&template.histogram)))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
            .ok_or_else(|| RecognitionError::scorer("template store is empty"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TemplateStore {
        let mut store = TemplateStore::new();
        store.enroll(1, &Frame::filled(8, 8, 30));
        store.enroll(2, &Frame::filled(8, 8, 220));
        store
    }

    #[test]
    fn test_full_frame_detector() {
        let frame = Frame::filled(320, 240, 0);
        assert_eq!(
            FullFrameDetector.detect(&frame).unwrap(),
            vec![Region::new(0, 0, 320, 240)]
        );
        assert!(FullFrameDetector.detect(&Frame::filled(0, 0, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_recognizer_picks_nearest_template() {
        let recognizer = HistogramRecognizer::new(store());

        let score = recognizer.score(&Frame::filled(8, 8, 221)).unwrap();
        assert_eq!(score.identity, 2);
        assert_eq!(score.distance, 0.0);

        let score = recognizer.score(&Frame::filled(8, 8, 120)).unwrap();
        assert_eq!(score.distance, 100.0);
    }

    #[test]
    fn test_recognizer_without_templates() {
        let recognizer = HistogramRecognizer::new(TemplateStore::new());
        assert!(matches!(
            recognizer.score(&Frame::filled(2, 2, 0)),
            Err(RecognitionError::Scorer { .. })
        ));
    }
}
