use crate::clusterer::Cluster;
use crate::features::{FeatureVector, NEVER_DONATED_RECENCY};
use crate::segments::confidence::cluster_confidence;
use crate::segments::types::{Criteria, SegmentKind, SegmentProfile};

pub const DEFAULT_CURRENCY: &str = "CAD";

/// Turns clusters into named, human-readable segment profiles.
#[derive(Debug, Clone)]
pub struct SegmentClassifier {
    currency: String,
}

impl Default for SegmentClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCY)
    }
}

impl SegmentClassifier {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }

    /// First matching rule of the decision table, evaluated on the centroid.
    pub fn kind_of(centroid: &FeatureVector) -> SegmentKind {
        let FeatureVector {
            recency,
            frequency,
            monetary,
            score,
        } = *centroid;

        if score >= 70.0 && monetary >= 500.0 {
            SegmentKind::HighPotential
        } else if recency > 180.0 && frequency > 0.0 {
            SegmentKind::AtRiskOfChurn
        } else if frequency >= 5.0 && monetary >= 250.0 {
            SegmentKind::Loyal
        } else if score >= 50.0 && recency <= 90.0 {
            SegmentKind::RecentlyActive
        } else if monetary >= 1000.0 {
            SegmentKind::Major
        } else {
            SegmentKind::Generic
        }
    }

    /// `cluster_index` only shows up in the generic segment name.
    pub fn classify(&self, cluster: &Cluster, cluster_index: usize) -> SegmentProfile {
        let c = &cluster.centroid;
        let donor_count = cluster.donors.len();
        let kind = Self::kind_of(c);
        let currency = &self.currency;

        let (name, description, criteria) = match kind {
            SegmentKind::HighPotential => (
                "High-potential donors".to_string(),
                format!(
                    "Donors with a high propensity score ({}) and a significant total donated. \
                     Ideal for major-gift campaigns.",
                    round(c.score)
                ),
                Criteria {
                    min_score: Some(70),
                    min_total_donated: Some(500),
                    ..Criteria::default()
                },
            ),
            SegmentKind::AtRiskOfChurn => (
                "At-risk-of-churn donors".to_string(),
                format!(
                    "Donors who have not given in over {} days. \
                     A reactivation campaign is recommended.",
                    round(c.recency)
                ),
                Criteria {
                    max_days_since_last_donation: Some(round(c.recency)),
                    min_donation_count: Some(1),
                    ..Criteria::default()
                },
            ),
            SegmentKind::Loyal => (
                "Loyal donors".to_string(),
                format!(
                    "Regular donors with {} or more donations and a total of {} {}.",
                    round(c.frequency),
                    round(c.monetary),
                    currency
                ),
                Criteria {
                    min_donation_count: Some(5),
                    min_total_donated: Some(250),
                    ..Criteria::default()
                },
            ),
            SegmentKind::RecentlyActive => (
                "Recently active donors".to_string(),
                format!(
                    "Active donors who gave recently (within the last {} days) \
                     with a good propensity score.",
                    round(c.recency)
                ),
                Criteria {
                    max_days_since_last_donation: Some(90),
                    min_score: Some(50),
                    ..Criteria::default()
                },
            ),
            SegmentKind::Major => (
                "Major donors".to_string(),
                format!(
                    "Donors who have contributed more than {} {} in total.",
                    round(c.monetary),
                    currency
                ),
                Criteria {
                    min_total_donated: Some(1000),
                    ..Criteria::default()
                },
            ),
            SegmentKind::Generic => (
                format!("Segment Cluster {}", cluster_index + 1),
                format!(
                    "Donor group identified by cluster analysis ({} donors).",
                    donor_count
                ),
                generic_criteria(c),
            ),
        };

        SegmentProfile {
            kind,
            name,
            description,
            criteria,
            donor_count,
            confidence: cluster_confidence(cluster),
        }
    }
}

/// Thresholds loosened 20% around the centroid, one per non-trivial feature.
fn generic_criteria(c: &FeatureVector) -> Criteria {
    let mut criteria = Criteria::default();

    if c.recency < NEVER_DONATED_RECENCY as f64 {
        criteria.max_days_since_last_donation = Some(round(c.recency * 1.2));
    }
    if c.frequency > 0.0 {
        criteria.min_donation_count = Some(round(c.frequency * 0.8).max(1));
    }
    if c.monetary > 0.0 {
        criteria.min_total_donated = Some(round(c.monetary * 0.8));
    }
    if c.score > 0.0 {
        criteria.min_score = Some(round(c.score * 0.8));
    }

    criteria
}

fn round(v: f64) -> i64 {
    v.round() as i64
}

/// Classify with the default currency.
pub fn classify(cluster: &Cluster, cluster_index: usize) -> SegmentProfile {
    SegmentClassifier::default().classify(cluster, cluster_index)
}
