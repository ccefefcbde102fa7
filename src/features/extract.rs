use chrono::{DateTime, Utc};

use crate::features::types::{DonorFeatures, DonorRecord};

/// Recency assigned to donors with no completed donation on record.
pub const NEVER_DONATED_RECENCY: i64 = 9999;

pub fn extract_features(record: &DonorRecord, now: DateTime<Utc>) -> DonorFeatures {
    let recency = match record.last_donation_date {
        // num_days truncates; a future date clamps to today
        Some(last) => (now - last).num_days().max(0),
        None => NEVER_DONATED_RECENCY,
    };

    DonorFeatures {
        id: record.id.clone(),
        recency,
        frequency: record
            .donation_count
            .map(|c| u32::try_from(c.max(0)).unwrap_or(u32::MAX))
            .unwrap_or(0),
        monetary: record.total_donations.unwrap_or(0.0),
        score: record.score.unwrap_or(0.0),
        is_active: record.is_active,
    }
}
