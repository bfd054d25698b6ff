//! Face recognition channel for the Carberus ECU.
//!
//! [`BiometricChannel`] runs a [`FaceDetector`] over each camera frame,
//! scores every face with a [`Recognizer`] and emits an
//! [`AuthEvent`](carberus_core::AuthEvent) for each face closer than the
//! configured distance threshold.
//!
//! The matching algorithm is pluggable. The crate ships a baseline pair,
//! [`FullFrameDetector`] and [`HistogramRecognizer`], backed by a JSON
//! [`TemplateStore`].

pub mod baseline;
pub mod channel;
pub mod error;
pub mod histogram;
pub mod templates;
pub mod traits;

pub use baseline::{FullFrameDetector, HistogramRecognizer};
pub use carberus_hardware::{Frame, Region};
pub use channel::{BiometricChannel, BiometricStats};
pub use error::RecognitionError;
pub use histogram::{HISTOGRAM_BINS, Histogram};
pub use templates::{Template, TemplateStore};
pub use traits::{FaceDetector, Recognizer, Score};
