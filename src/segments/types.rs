use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Threshold rules describing segment membership. Only the present keys
/// are serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_days_since_last_donation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_donation_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_total_donated: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<i64>,
}

impl Criteria {
    pub fn is_empty(&self) -> bool {
        self == &Criteria::default()
    }
}

/// Which rule of the decision table matched a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    HighPotential,
    AtRiskOfChurn,
    Loyal,
    RecentlyActive,
    Major,
    Generic,
}

/// Classifier output for a single cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentProfile {
    pub kind: SegmentKind,
    pub name: String,
    pub description: String,
    pub criteria: Criteria,
    pub donor_count: usize,
    pub confidence: f64,
}

/// A proposed segment awaiting operator review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSuggestion {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub description: String,
    pub criteria: Criteria,
    pub donor_count: u32,
    pub cluster_id: String,
    pub confidence: f64,
    pub is_accepted: bool,
    pub created_at: DateTime<Utc>,
}

impl SegmentSuggestion {
    pub fn from_profile(
        organization_id: &str,
        cluster_id: &str,
        profile: SegmentProfile,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            name: profile.name,
            description: profile.description,
            criteria: profile.criteria,
            donor_count: u32::try_from(profile.donor_count).unwrap_or(u32::MAX),
            cluster_id: cluster_id.to_string(),
            confidence: profile.confidence,
            is_accepted: false,
            created_at,
        }
    }
}
