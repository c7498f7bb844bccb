//! Conversion of network probabilities into hard labels

use serde::Serialize;

/// Thresholds probabilities into binary labels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Binarizer {
    threshold: f64,
}

impl Binarizer {
    /// `threshold` is expected to be validated already (in [0, 1])
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// 1 when `probability >= threshold`, 0 otherwise
    pub fn label(&self, probability: f32) -> u8 {
        u8::from(f64::from(probability) >= self.threshold)
    }

    pub fn label_map(&self, probabilities: &[f32]) -> Vec<u8> {
        probabilities.iter().map(|&p| self.label(p)).collect()
    }

    /// Foreground probability of one voxel from per-channel output
    ///
    /// With a single channel the value is the foreground probability itself;
    /// with several channels the last one is the foreground class.
    pub fn foreground_probability(channels: &[f32]) -> Option<f32> {
        channels.last().copied()
    }
}
