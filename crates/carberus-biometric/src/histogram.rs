//! Intensity histograms and their chi-square distance.
//!
//! Distances are scaled to `0.0..=100.0`: identical histograms score 0,
//! histograms with disjoint support score 100. The acceptance threshold is
//! expressed on the same scale.

use carberus_hardware::Frame;
use serde::{Deserialize, Serialize};

/// Number of intensity bins; each covers four grey levels.
pub const HISTOGRAM_BINS: usize = 64;

const DISTANCE_SCALE: f64 = 100.0;

/// Normalised grey-level histogram (bins sum to 1, or all zero for an empty
/// image).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Histogram {
    bins: [f64; HISTOGRAM_BINS],
}

impl Histogram {
    /// Histogram of every pixel of `frame`.
    #[must_use]
    pub fn of(frame: &Frame) -> Self {
        let mut counts = [0u64; HISTOGRAM_BINS];
        for pixel in frame.pixels() {
            counts[usize::from(*pixel) * HISTOGRAM_BINS / 256] += 1;
        }

        let total = frame.pixels().len();
        let mut bins = [0.0; HISTOGRAM_BINS];
        if total > 0 {
            for (bin, count) in bins.iter_mut().zip(counts) {
                *bin = count as f64 / total as f64;
            }
        }
        Self { bins }
    }

    /// Build from raw bin weights, normalising them.
    ///
    /// Returns `None` if a weight is negative or not finite.
    #[must_use]
    pub fn from_weights(weights: [f64; HISTOGRAM_BINS]) -> Option<Self> {
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return None;
        }
        let sum: f64 = weights.iter().sum();
        let mut bins = weights;
        if sum > 0.0 {
            bins.iter_mut().for_each(|b| *b /= sum);
        }
        Some(Self { bins })
    }

    #[must_use]
    pub fn bins(&self) -> &[f64; HISTOGRAM_BINS] {
        &self.bins
    }

    /// Symmetric chi-square distance, scaled to `0.0..=100.0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use carberus_biometric::Histogram;
    /// use carberus_hardware::Frame;
    ///
    /// let dark = Histogram::of(&Frame::filled(8, 8, 10));
    /// let light = Histogram::of(&Frame::filled(8, 8, 240));
    ///
    /// assert_eq!(dark.distance(&dark), 0.0);
    /// assert_eq!(dark.distance(&light), 100.0);
    /// ```
    #[must_use]
    pub fn distance(&self, other: &Histogram) -> f64 {
        let chi_square: f64 = self
            .bins
            .iter()
            .zip(&other.bins)
            .filter(|(a, b)| **a + **b > 0.0)
            .map(|(a, b)| (a - b).powi(2) / (a + b))
            .sum();
        chi_square * 0.5 * DISTANCE_SCALE
    }
}

impl TryFrom<Vec<f64>> for Histogram {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        let len = values.len();
        let weights: [f64; HISTOGRAM_BINS] = values
            .try_into()
            .map_err(|_| format!("histogram needs {HISTOGRAM_BINS} bins, got {len}"))?;
        Self::from_weights(weights).ok_or_else(|| "histogram bins must be finite and non-negative".to_string())
    }
}

impl From<Histogram> for Vec<f64> {
    fn from(histogram: Histogram) -> Self {
        histogram.bins.to_vec()
    }
}
