use serde::{Deserialize, Serialize};

/// Words at or above this percentage count as high confidence.
pub const HIGH_CONFIDENCE: f64 = 80.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStats {
    /// Mean word confidence as a percentage.
    pub average_confidence: f64,
    pub total_words: usize,
    pub low_confidence_words: usize,
    pub high_confidence_words: usize,
    pub distribution: ConfidenceDistribution,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ConfidenceStats {
    /// `confidences` are engine values in 0..=1; `low_threshold` is a percentage.
    pub fn from_word_confidences(confidences: &[f32], low_threshold: f64) -> Self {
        if confidences.is_empty() {
            return Self::default();
        }

        let percents: Vec<f64> = confidences
            .iter()
            .map(|c| (f64::from(*c) * 100.0).clamp(0.0, 100.0))
            .collect();

        let total = percents.len();
        let average = percents.iter().sum::<f64>() / total as f64;
        let low = percents.iter().filter(|p| **p < low_threshold).count();
        let high = percents.iter().filter(|p| **p >= HIGH_CONFIDENCE).count();

        Self {
            average_confidence: (average * 100.0).round() / 100.0,
            total_words: total,
            low_confidence_words: low,
            high_confidence_words: high,
            distribution: ConfidenceDistribution {
                high,
                medium: total - high - low.min(total - high),
                low,
            },
        }
    }

    pub fn is_low(&self, threshold: f64) -> bool {
        self.total_words > 0 && self.average_confidence < threshold
    }
}
