use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recency, frequency and monetary ratings, each from 1 (weakest) to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfmScore {
    pub recency: u8,
    pub frequency: u8,
    pub monetary: u8,
}

const RECENCY_WEIGHT: f64 = 0.4;
const FREQUENCY_WEIGHT: f64 = 0.3;
const MONETARY_WEIGHT: f64 = 0.3;

pub fn rfm_score(
    last_donation_date: Option<DateTime<Utc>>,
    donation_count: usize,
    total_donations: f64,
    now: DateTime<Utc>,
) -> RfmScore {
    let recency = match last_donation_date.map(|d| (now - d).num_days()) {
        Some(days) if days <= 30 => 5,
        Some(days) if days <= 90 => 4,
        Some(days) if days <= 180 => 3,
        Some(days) if days <= 365 => 2,
        _ => 1,
    };

    let frequency = match donation_count {
        n if n >= 10 => 5,
        n if n >= 5 => 4,
        n if n >= 3 => 3,
        n if n >= 1 => 2,
        _ => 1,
    };

    let monetary = match total_donations {
        t if t >= 1000.0 => 5,
        t if t >= 500.0 => 4,
        t if t >= 250.0 => 3,
        t if t >= 100.0 => 2,
        _ => 1,
    };

    RfmScore {
        recency,
        frequency,
        monetary,
    }
}

/// Weighted RFM ratings rescaled to a 0-100 propensity score.
pub fn propensity_score(rfm: RfmScore) -> u8 {
    let weighted = (rfm.recency as f64 * RECENCY_WEIGHT
        + rfm.frequency as f64 * FREQUENCY_WEIGHT
        + rfm.monetary as f64 * MONETARY_WEIGHT)
        / 5.0
        * 100.0;

    weighted.round().clamp(0.0, 100.0) as u8
}
