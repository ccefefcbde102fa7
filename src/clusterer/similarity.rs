use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;

/// Recency beyond a year saturates.
pub const MAX_RECENCY_DAYS: f64 = 365.0;
pub const MAX_FREQUENCY: f64 = 50.0;
/// In base currency units.
pub const MAX_MONETARY: f64 = 10_000.0;
pub const MAX_SCORE: f64 = 100.0;

/// Fixed per-dimension caps used to bring the four features onto a
/// comparable [0, 1] scale. They are assumed realistic maxima, not derived
/// from the data, so distances stay comparable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalization {
    pub max_recency_days: f64,
    pub max_frequency: f64,
    pub max_monetary: f64,
    pub max_score: f64,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            max_recency_days: MAX_RECENCY_DAYS,
            max_frequency: MAX_FREQUENCY,
            max_monetary: MAX_MONETARY,
            max_score: MAX_SCORE,
        }
    }
}

impl Normalization {
    /// Score is divided but not clamped; upstream keeps it in [0, 100].
    pub fn normalize(&self, v: &FeatureVector) -> FeatureVector {
        FeatureVector {
            recency: (v.recency / self.max_recency_days).min(1.0),
            frequency: (v.frequency / self.max_frequency).min(1.0),
            monetary: (v.monetary / self.max_monetary).min(1.0),
            score: v.score / self.max_score,
        }
    }

    pub fn distance(&self, a: &FeatureVector, b: &FeatureVector) -> f64 {
        let a = self.normalize(a);
        let b = self.normalize(b);

        let dr = a.recency - b.recency;
        let df = a.frequency - b.frequency;
        let dm = a.monetary - b.monetary;
        let ds = a.score - b.score;

        (dr * dr + df * df + dm * dm + ds * ds).sqrt()
    }
}

/// Normalized Euclidean distance with the default caps.
pub fn distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
    Normalization::default().distance(a, b)
}
