use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::features::DonorRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationTrend {
    Decreasing,
    Stable,
    Increasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn from_probability(p: f64) -> Self {
        if p >= 0.75 {
            RiskTier::High
        } else if p >= 0.5 {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnFactors {
    /// `None` when the donor never gave.
    pub days_since_last_donation: Option<i64>,
    /// Donations per year since the first one.
    pub donation_frequency: f64,
    pub donation_trend: DonationTrend,
    pub average_donation_amount: f64,
    pub has_active_subscription: bool,
    pub donation_count: i64,
    /// 0 to 1.
    pub engagement_score: f64,
}

/// Donations considered on each side of the trend comparison.
const TREND_WINDOW: usize = 3;

pub fn churn_factors(record: &DonorRecord, now: DateTime<Utc>) -> ChurnFactors {
    let days_since_last_donation = record.last_donation_date.map(|d| (now - d).num_days());
    let donation_count = record.donation_count.unwrap_or(0);

    let mut donation_frequency = 0.0;
    if let Some(first) = record.first_donation_date {
        let days_since_first = (now - first).num_days();
        if donation_count > 0 && days_since_first > 0 {
            donation_frequency = donation_count as f64 / days_since_first as f64 * 365.0;
        }
    }

    let donations = &record.donations;
    let mut donation_trend = DonationTrend::Stable;
    if donations.len() >= TREND_WINDOW * 2 {
        let recent = mean(donations[..TREND_WINDOW].iter().map(|d| d.amount));
        let older = mean(donations[TREND_WINDOW..TREND_WINDOW * 2].iter().map(|d| d.amount));

        if recent > older * 1.1 {
            donation_trend = DonationTrend::Increasing;
        } else if recent < older * 0.9 {
            donation_trend = DonationTrend::Decreasing;
        }
    }

    let average_donation_amount = mean(donations.iter().map(|d| d.amount));

    let mut engagement_score: f64 = 0.0;
    if donation_count > 0 {
        engagement_score += match days_since_last_donation {
            Some(d) if d <= 30 => 0.4,
            Some(d) if d <= 90 => 0.3,
            Some(d) if d <= 180 => 0.2,
            Some(d) if d <= 365 => 0.1,
            _ => 0.0,
        };

        engagement_score += if donation_frequency >= 4.0 {
            0.3
        } else if donation_frequency >= 2.0 {
            0.2
        } else if donation_frequency >= 1.0 {
            0.1
        } else {
            0.0
        };

        if record.has_active_subscription {
            engagement_score += 0.3;
        }
    }

    ChurnFactors {
        days_since_last_donation,
        donation_frequency,
        donation_trend,
        average_donation_amount,
        has_active_subscription: record.has_active_subscription,
        donation_count,
        engagement_score: engagement_score.min(1.0),
    }
}

/// Probability in `[0, 1]` that the donor stops giving.
pub fn churn_probability(factors: &ChurnFactors) -> f64 {
    let mut score = match factors.days_since_last_donation {
        None => 0.4,
        Some(d) if d > 365 => 0.4,
        Some(d) if d > 180 => 0.3,
        Some(d) if d > 90 => 0.2,
        Some(d) if d > 30 => 0.1,
        Some(_) => 0.0,
    };

    if factors.donation_frequency == 0.0 {
        score += 0.2;
    } else if factors.donation_frequency < 1.0 {
        score += 0.15;
    } else if factors.donation_frequency < 2.0 {
        score += 0.1;
    }

    match factors.donation_trend {
        DonationTrend::Decreasing => score += 0.15,
        DonationTrend::Stable if factors.donation_count > 3 => score += 0.05,
        _ => {}
    }

    score += (1.0 - factors.engagement_score) * 0.25;

    score.clamp(0.0, 1.0)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
