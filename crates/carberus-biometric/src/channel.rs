//! Face recognition authentication channel.

use crate::baseline::{FullFrameDetector, HistogramRecognizer};
use crate::error::RecognitionError;
use crate::templates::TemplateStore;
use crate::traits::{FaceDetector, Recognizer};
use carberus_core::config::BiometricConfig;
use carberus_core::constants::UNKNOWN_IDENTITY_PREFIX;
use carberus_core::{AuthEvent, EventCategory, Result};
use carberus_hardware::{Frame, Region};
use serde::Serialize;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, info, warn};

/// Biometric channel counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BiometricStats {
    pub frames_polled: u64,
    pub faces_evaluated: u64,
    pub faces_accepted: u64,
    pub faces_rejected: u64,
    pub recognition_errors: u64,
}

/// Turns camera frames into biometric [`AuthEvent`]s.
///
/// Every detected face is scored on its own; a face whose distance is
/// strictly below the threshold yields one event. Faults on one face skip
/// that face only, including a detector or recognizer that panics.
///
/// # Examples
///
/// ```
/// use carberus_biometric::{BiometricChannel, FullFrameDetector, HistogramRecognizer, TemplateStore};
/// use carberus_core::config::BiometricConfig;
/// use carberus_hardware::Frame;
///
/// let mut store = TemplateStore::new();
/// store.enroll(1, &Frame::filled(16, 16, 90));
///
/// let mut channel = BiometricChannel::new(
///     Box::new(FullFrameDetector),
///     Box::new(HistogramRecognizer::new(store)),
///     &BiometricConfig::default(),
/// );
///
/// let events = channel.poll(&Frame::filled(16, 16, 90));
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].label.as_deref(), Some("User1"));
/// ```
pub struct BiometricChannel {
    detector: Box<dyn FaceDetector>,
    recognizer: Box<dyn Recognizer>,
    threshold: f64,
    labels: Vec<String>,
    stats: BiometricStats,
}

impl BiometricChannel {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        recognizer: Box<dyn Recognizer>,
        config: &BiometricConfig,
    ) -> Self {
        Self {
            detector,
            recognizer,
            threshold: config.distance_threshold,
            labels: config.labels.clone(),
            stats: BiometricStats::default(),
        }
    }

    /// Baseline channel over the configured template store.
    ///
    /// Returns `Ok(None)` when the store file does not exist; the caller
    /// runs without face recognition.
    ///
    /// # Errors
    ///
    /// Returns an error if the store exists but cannot be loaded.
    pub fn from_config(config: &BiometricConfig) -> Result<Option<Self>> {
        let Some(store) = TemplateStore::load(&config.template_path)? else {
            return Ok(None);
        };

        Ok(Some(Self::new(
            Box::new(FullFrameDetector),
            Box::new(HistogramRecognizer::new(store)),
            config,
        )))
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    #[must_use]
    pub fn stats(&self) -> BiometricStats {
        self.stats
    }

    /// Label for an identity id, `ID_<id>` when it has no configured name.
    #[must_use]
    pub fn label_for(&self, identity: u32) -> String {
        usize::try_from(identity)
            .ok()
            .and_then(|index| self.labels.get(index))
            .cloned()
            .unwrap_or_else(|| format!("{UNKNOWN_IDENTITY_PREFIX}{identity}"))
    }

    /// Evaluate every face in `frame`.
    pub fn poll(&mut self, frame: &Frame) -> Vec<AuthEvent> {
        self.stats.frames_polled += 1;

        let detected = catch_unwind(AssertUnwindSafe(|| self.detector.detect(frame)))
            .unwrap_or_else(|panic| Err(RecognitionError::detector(panic_message(&*panic))));
        let regions = match detected {
            Ok(regions) => regions,
            Err(e) => {
                self.record_error(&e);
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        for region in regions {
            self.stats.faces_evaluated += 1;
            match self.evaluate(frame, &region) {
                Ok(Some(event)) => {
                    self.stats.faces_accepted += 1;
                    events.push(event);
                }
                Ok(None) => self.stats.faces_rejected += 1,
                Err(e) => self.record_error(&e),
            }
        }
        events
    }

    fn evaluate(&self, frame: &Frame, region: &Region) -> std::result::Result<Option<AuthEvent>, RecognitionError> {
        let face = frame
            .crop(region)
            .map_err(|e| RecognitionError::invalid_region(e.to_string()))?;
        let score = catch_unwind(AssertUnwindSafe(|| self.recognizer.score(&face)))
            .unwrap_or_else(|panic| Err(RecognitionError::scorer(panic_message(&*panic))))?;
        if !score.distance.is_finite() {
            return Err(RecognitionError::scorer(format!(
                "non-finite distance {}",
                score.distance
            )));
        }

        if score.distance < self.threshold {
            let label = self.label_for(score.identity);
            info!(
                category = EventCategory::Biometric.as_str(),
                identity = score.identity,
                distance = score.distance,
                label = %label,
                "Face recognized"
            );
            Ok(Some(AuthEvent::biometric(label)))
        } else {
            debug!(
                category = EventCategory::Biometric.as_str(),
                identity = score.identity,
                distance = score.distance,
                "Face not recognized"
            );
            Ok(None)
        }
    }

    fn record_error(&mut self, error: &RecognitionError) {
        self.stats.recognition_errors += 1;
        warn!(
            category = EventCategory::Error.as_str(),
            error = %error,
            "Face skipped"
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown payload".to_string());
    format!("panicked: {detail}")
}

impl std::fmt::Debug for BiometricChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiometricChannel")
            .field("threshold", &self.threshold)
            .field("labels", &self.labels)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as RecognitionResult;
    use crate::traits::Score;
    use carberus_core::AuthSource;
    use rstest::rstest;
    use std::sync::Mutex;
    use std::collections::VecDeque;

    /// Detector returning fixed regions.
    struct FixedRegions(Vec<Region>);

    impl FaceDetector for FixedRegions {
        fn detect(&self, _frame: &Frame) -> RecognitionResult<Vec<Region>> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(&self, _frame: &Frame) -> RecognitionResult<Vec<Region>> {
            Err(RecognitionError::detector("model not loaded"))
        }
    }

    /// Recognizer returning scripted outcomes, one per call.
    struct Scripted(Mutex<VecDeque<RecognitionResult<Score>>>);

    impl Scripted {
        fn new(outcomes: Vec<RecognitionResult<Score>>) -> Self {
            Self(Mutex::new(outcomes.into()))
        }
    }

    impl Recognizer for Scripted {
        fn score(&self, _face: &Frame) -> RecognitionResult<Score> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RecognitionError::scorer("script exhausted")))
        }
    }

    fn channel(regions: Vec<Region>, outcomes: Vec<RecognitionResult<Score>>) -> BiometricChannel {
        BiometricChannel::new(
            Box::new(FixedRegions(regions)),
            Box::new(Scripted::new(outcomes)),
            &BiometricConfig::default(),
        )
    }

    fn face() -> Region {
        Region::new(0, 0, 4, 4)
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(59.0, true)]
    #[case(59.999, true)]
    #[case(60.0, false)]
    #[case(61.0, false)]
    fn test_distance_threshold(#[case] distance: f64, #[case] granted: bool) {
        let mut channel = channel(vec![face()], vec![Ok(Score::new(1, distance))]);

        let events = channel.poll(&Frame::filled(4, 4, 0));
        assert_eq!(events.len(), usize::from(granted));
        if granted {
            assert_eq!(events[0].source, AuthSource::Biometric);
            assert_eq!(events[0].label.as_deref(), Some("User1"));
        }
    }

    #[rstest]
    #[case(0, "None")]
    #[case(3, "User3")]
    #[case(4, "ID_4")]
    #[case(u32::MAX, "ID_4294967295")]
    fn test_label_mapping(#[case] identity: u32, #[case] expected: &str) {
        let channel = channel(Vec::new(), Vec::new());
        assert_eq!(channel.label_for(identity), expected);
    }

    #[test]
    fn test_each_face_yields_its_own_event() {
        let mut channel = channel(
            vec![face(), face(), face()],
            vec![
                Ok(Score::new(1, 10.0)),
                Ok(Score::new(2, 80.0)),
                Ok(Score::new(7, 20.0)),
            ],
        );

        let labels: Vec<_> = channel
            .poll(&Frame::filled(4, 4, 0))
            .into_iter()
            .filter_map(|e| e.label)
            .collect();
        assert_eq!(labels, vec!["User1".to_string(), "ID_7".to_string()]);

        let stats = channel.stats();
        assert_eq!(stats.faces_evaluated, 3);
        assert_eq!(stats.faces_accepted, 2);
        assert_eq!(stats.faces_rejected, 1);
    }

    #[test]
    fn test_scorer_fault_skips_only_that_face() {
        let mut channel = channel(
            vec![face(), face()],
            vec![Err(RecognitionError::scorer("nan")), Ok(Score::new(2, 5.0))],
        );

        let events = channel.poll(&Frame::filled(4, 4, 0));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label.as_deref(), Some("User2"));
        assert_eq!(channel.stats().recognition_errors, 1);
    }

    /// Recognizer that panics on its first call, then scores identity 1.
    struct PanicsOnce(Mutex<bool>);

    impl Recognizer for PanicsOnce {
        fn score(&self, _face: &Frame) -> RecognitionResult<Score> {
            let mut first = self.0.lock().unwrap();
            if std::mem::replace(&mut *first, false) {
                drop(first);
                panic!("recognizer model crashed");
            }
            Ok(Score::new(1, 10.0))
        }
    }

    struct PanickingDetector;

    impl FaceDetector for PanickingDetector {
        fn detect(&self, _frame: &Frame) -> RecognitionResult<Vec<Region>> {
            panic!("detector model crashed")
        }
    }

    #[test]
    fn test_scorer_panic_skips_only_that_face() {
        let mut channel = BiometricChannel::new(
            Box::new(FixedRegions(vec![face(), face()])),
            Box::new(PanicsOnce(Mutex::new(true))),
            &BiometricConfig::default(),
        );

        let events = channel.poll(&Frame::filled(4, 4, 0));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label.as_deref(), Some("User1"));

        // Later frames are still evaluated.
        assert_eq!(channel.poll(&Frame::filled(4, 4, 0)).len(), 2);
        let stats = channel.stats();
        assert_eq!(stats.recognition_errors, 1);
        assert_eq!(stats.faces_evaluated, 4);
        assert_eq!(stats.faces_accepted, 3);
    }

    #[test]
    fn test_detector_panic_is_counted() {
        let mut channel = BiometricChannel::new(
            Box::new(PanickingDetector),
            Box::new(Scripted::new(Vec::new())),
            &BiometricConfig::default(),
        );

        assert!(channel.poll(&Frame::filled(4, 4, 0)).is_empty());
        assert_eq!(channel.stats().recognition_errors, 1);
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::NEG_INFINITY)]
    fn test_non_finite_distance_is_a_fault(#[case] distance: f64) {
        let mut channel = channel(vec![face()], vec![Ok(Score::new(1, distance))]);

        assert!(channel.poll(&Frame::filled(4, 4, 0)).is_empty());
        assert_eq!(channel.stats().recognition_errors, 1);
    }

    #[test]
    fn test_region_outside_frame_is_skipped() {
        let mut channel = channel(
            vec![Region::new(2, 2, 10, 10), face()],
            vec![Ok(Score::new(1, 5.0))],
        );

        let events = channel.poll(&Frame::filled(4, 4, 0));
        assert_eq!(events.len(), 1);
        assert_eq!(channel.stats().recognition_errors, 1);
    }

    #[test]
    fn test_detector_fault_yields_nothing() {
        let mut channel = BiometricChannel::new(
            Box::new(FailingDetector),
            Box::new(Scripted::new(Vec::new())),
            &BiometricConfig::default(),
        );

        assert!(channel.poll(&Frame::filled(4, 4, 0)).is_empty());
        assert!(channel.poll(&Frame::filled(4, 4, 0)).is_empty());
        let stats = channel.stats();
        assert_eq!(stats.frames_polled, 2);
        assert_eq!(stats.recognition_errors, 2);
    }

    #[test]
    fn test_from_config_without_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = BiometricConfig {
            template_path: dir.path().join("trainer.json"),
            ..BiometricConfig::default()
        };
        assert!(BiometricChannel::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_from_config_with_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trainer.json");
        let mut store = TemplateStore::new();
        store.enroll(2, &Frame::filled(8, 8, 150));
        store.save(&path).unwrap();

        let config = BiometricConfig {
            template_path: path,
            ..BiometricConfig::default()
        };
        let mut channel = BiometricChannel::from_config(&config).unwrap().unwrap();

        let events = channel.poll(&Frame::filled(8, 8, 150));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label.as_deref(), Some("User2"));
        assert!(channel.poll(&Frame::filled(8, 8, 10)).is_empty());
    }
}
