use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed donation attached to a donor record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub id: String,
    pub amount: f64,
    pub donated_at: DateTime<Utc>,
}

/// A donor row as read from the store, with its completed donations
/// (newest first).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DonorRecord {
    pub id: String,
    pub organization_id: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub last_donation_date: Option<DateTime<Utc>>,
    pub first_donation_date: Option<DateTime<Utc>>,
    pub donation_count: Option<i64>,
    pub total_donations: Option<f64>,
    pub score: Option<f64>,
    pub churn_probability: Option<f64>,
    pub donations: Vec<Donation>,
    pub has_active_subscription: bool,
}

/// RFM + propensity features for one donor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonorFeatures {
    pub id: String,
    /// Whole days since the last completed donation.
    pub recency: i64,
    pub frequency: u32,
    pub monetary: f64,
    pub score: f64,
    /// Informational, never used for distance.
    pub is_active: bool,
}

impl DonorFeatures {
    pub fn vector(&self) -> FeatureVector {
        FeatureVector {
            recency: self.recency as f64,
            frequency: self.frequency as f64,
            monetary: self.monetary,
            score: self.score,
        }
    }
}

/// A point in the four-dimensional feature space. Centroids are
/// `FeatureVector`s too, so their components are fractional.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub recency: f64,
    pub frequency: f64,
    pub monetary: f64,
    pub score: f64,
}

impl FeatureVector {
    pub fn new(recency: f64, frequency: f64, monetary: f64, score: f64) -> Self {
        Self {
            recency,
            frequency,
            monetary,
            score,
        }
    }
}
