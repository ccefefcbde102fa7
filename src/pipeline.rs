//! Batch jobs run against a donor store: segment suggestions, propensity
//! scores and churn predictions. Each job does one bulk read, computes in
//! memory and commits its writes in a single transaction.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::clusterer::kmeans;
use crate::config::SegmentationConfig;
use crate::db::{DonorDB, Organization};
use crate::error::PipelineError;
use crate::features::{extract_features, DonorFeatures};
use crate::scoring::{
    churn_factors, churn_probability, propensity_score, rfm_score, RfmScore, RiskTier,
};
use crate::segments::{SegmentClassifier, SegmentSuggestion};

#[derive(Debug, Clone, Serialize)]
pub struct SuggestionReport {
    pub organization: Organization,
    pub donor_count: usize,
    /// Requested cluster count, 0 when there were no donors.
    pub k: usize,
    pub cluster_count: usize,
    pub iterations: usize,
    /// Clusters below the minimum segment size.
    pub skipped_clusters: usize,
    /// Unaccepted suggestions removed by this run.
    pub replaced: usize,
    pub suggestions: Vec<SegmentSuggestion>,
}

/// Cluster the organization's active donors and replace its pending
/// segment suggestions with the result.
///
/// Nothing is written when the organization has no active donors.
pub fn generate_segment_suggestions<R>(
    db: &mut DonorDB,
    organization_id: &str,
    config: &SegmentationConfig,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<SuggestionReport, PipelineError>
where
    R: Rng + ?Sized,
{
    let organization = require_organization(db, organization_id)?;
    let donors = db.active_donors(organization_id)?;
    info!(organization = organization_id, donors = donors.len(), "loaded donors");

    let mut report = SuggestionReport {
        organization,
        donor_count: donors.len(),
        k: 0,
        cluster_count: 0,
        iterations: 0,
        skipped_clusters: 0,
        replaced: 0,
        suggestions: Vec::new(),
    };

    if donors.is_empty() {
        return Ok(report);
    }

    let features: Vec<DonorFeatures> = donors.iter().map(|d| extract_features(d, now)).collect();

    report.k = config.cluster_count(features.len());
    let result = kmeans(&features, report.k, &config.kmeans_params(), rng);
    report.cluster_count = result.clusters.len();
    report.iterations = result.iterations;
    info!(
        k = report.k,
        clusters = report.cluster_count,
        iterations = report.iterations,
        "clustering finished"
    );

    let classifier = SegmentClassifier::new(config.currency.clone());
    for (index, cluster) in result.clusters.iter().enumerate() {
        if cluster.len() < config.min_segment_size {
            warn!(cluster = %cluster.id, size = cluster.len(), "cluster too small, skipped");
            report.skipped_clusters += 1;
            continue;
        }

        let profile = classifier.classify(cluster, index);
        report
            .suggestions
            .push(SegmentSuggestion::from_profile(organization_id, &cluster.id, profile, now));
    }

    report.replaced = db.replace_suggestions(organization_id, &report.suggestions)?;
    info!(
        created = report.suggestions.len(),
        replaced = report.replaced,
        "suggestions stored"
    );

    Ok(report)
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredDonor {
    pub donor_id: String,
    pub email: Option<String>,
    pub rfm: RfmScore,
    pub score: u8,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoreReport {
    pub scored: Vec<ScoredDonor>,
}

/// Recompute the propensity score of every donor (active or not),
/// optionally limited to one organization.
pub fn update_propensity_scores(
    db: &mut DonorDB,
    organization_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ScoreReport, PipelineError> {
    if let Some(id) = organization_id {
        require_organization(db, id)?;
    }

    let donors = db.donors(organization_id)?;
    let scored: Vec<ScoredDonor> = donors
        .into_iter()
        .map(|d| {
            let rfm = rfm_score(
                d.last_donation_date,
                d.donations.len(),
                d.total_donations.unwrap_or(0.0),
                now,
            );
            ScoredDonor {
                donor_id: d.id,
                email: d.email,
                rfm,
                score: propensity_score(rfm),
            }
        })
        .collect();

    let updates: Vec<(String, f64)> = scored
        .iter()
        .map(|s| (s.donor_id.clone(), f64::from(s.score)))
        .collect();
    db.update_scores(&updates)?;
    info!(updated = updates.len(), "propensity scores stored");

    Ok(ScoreReport { scored })
}

#[derive(Debug, Clone, Serialize)]
pub struct ChurnPrediction {
    pub donor_id: String,
    pub email: Option<String>,
    pub probability: f64,
    pub tier: RiskTier,
    pub days_since_last_donation: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChurnReport {
    pub predictions: Vec<ChurnPrediction>,
}

impl ChurnReport {
    pub fn count(&self, tier: RiskTier) -> usize {
        self.predictions.iter().filter(|p| p.tier == tier).count()
    }

    pub fn high_risk(&self) -> impl Iterator<Item = &ChurnPrediction> {
        self.predictions.iter().filter(|p| p.tier == RiskTier::High)
    }
}

/// Predict churn probability for active donors, optionally limited to one
/// organization.
pub fn predict_churn(
    db: &mut DonorDB,
    organization_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ChurnReport, PipelineError> {
    if let Some(id) = organization_id {
        require_organization(db, id)?;
    }

    let donors = db.donors(organization_id)?;
    let predictions: Vec<ChurnPrediction> = donors
        .into_iter()
        .filter(|d| d.is_active)
        .map(|d| {
            let factors = churn_factors(&d, now);
            let probability = churn_probability(&factors);
            ChurnPrediction {
                donor_id: d.id,
                email: d.email,
                probability,
                tier: RiskTier::from_probability(probability),
                days_since_last_donation: factors.days_since_last_donation,
            }
        })
        .collect();

    let updates: Vec<(String, f64)> = predictions
        .iter()
        .map(|p| (p.donor_id.clone(), p.probability))
        .collect();
    db.update_churn_probabilities(&updates)?;
    info!(updated = updates.len(), "churn probabilities stored");

    Ok(ChurnReport { predictions })
}

fn require_organization(
    db: &DonorDB,
    organization_id: &str,
) -> Result<Organization, PipelineError> {
    db.get_organization(organization_id)?
        .ok_or_else(|| PipelineError::OrganizationNotFound(organization_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DONATION_COMPLETED, SUBSCRIPTION_ACTIVE};
    use crate::features::{Donation, DonorRecord};
    use crate::segments::Criteria;
    use chrono::{Duration, TimeZone};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn db_with_org() -> DonorDB {
        let db = DonorDB::new_in_memory().unwrap();
        db.insert_organization(&Organization {
            id: "org-1".to_string(),
            name: "River Trust".to_string(),
        })
        .unwrap();
        db
    }

    fn add_donor(db: &DonorDB, id: &str, days: Option<i64>, count: i64, total: f64, score: f64) {
        db.insert_donor(&DonorRecord {
            id: id.to_string(),
            organization_id: "org-1".to_string(),
            email: Some(format!("{}@example.org", id)),
            is_active: true,
            last_donation_date: days.map(|d| now() - Duration::days(d)),
            first_donation_date: days.map(|d| now() - Duration::days(d + 400)),
            donation_count: Some(count),
            total_donations: Some(total),
            score: Some(score),
            ..Default::default()
        })
        .unwrap();
    }

    /// Two tight, well separated groups of `per_group` donors each.
    fn grouped_db(per_group: i64) -> DonorDB {
        let db = db_with_org();
        for i in 0..per_group {
            add_donor(&db, &format!("major-{}", i), Some(10 + i), 3, 600.0, 80.0);
        }
        for i in 0..per_group {
            add_donor(&db, &format!("lapsed-{}", i), Some(200 + i), 2, 50.0, 20.0);
        }
        db
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_unknown_organization() {
        let mut db = db_with_org();
        let err = generate_segment_suggestions(
            &mut db,
            "nope",
            &SegmentationConfig::default(),
            &mut rng(),
            now(),
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::OrganizationNotFound(id) if id == "nope"));
    }

    #[test]
    fn test_no_donors_writes_nothing() {
        let mut db = db_with_org();
        let stale = SegmentSuggestion {
            id: "s-1".to_string(),
            organization_id: "org-1".to_string(),
            name: "stale".to_string(),
            description: String::new(),
            criteria: Criteria::default(),
            donor_count: 3,
            cluster_id: "cluster-0".to_string(),
            confidence: 0.5,
            is_accepted: false,
            created_at: now(),
        };
        db.replace_suggestions("org-1", &[stale]).unwrap();

        let report = generate_segment_suggestions(
            &mut db,
            "org-1",
            &SegmentationConfig::default(),
            &mut rng(),
            now(),
        )
        .unwrap();

        assert_eq!(report.donor_count, 0);
        assert_eq!(report.k, 0);
        assert!(report.suggestions.is_empty());
        assert_eq!(db.list_suggestions("org-1").unwrap().len(), 1);
    }

    #[test]
    fn test_two_segments_are_suggested() {
        let mut db = grouped_db(6);
        let report = generate_segment_suggestions(
            &mut db,
            "org-1",
            &SegmentationConfig::default(),
            &mut rng(),
            now(),
        )
        .unwrap();

        assert_eq!(report.donor_count, 12);
        assert_eq!(report.k, 2);
        assert_eq!(report.cluster_count, 2);
        assert_eq!(report.suggestions.len(), 2);

        let mut names: Vec<&str> = report.suggestions.iter().map(|s| s.name.as_str()).collect();
        names.sort();
        assert_eq!(names, ["At-risk-of-churn donors", "High-potential donors"]);

        for s in &report.suggestions {
            assert_eq!(s.donor_count, 6);
            assert!(s.confidence > 0.99);
            assert_eq!(s.organization_id, "org-1");
        }

        let at_risk = report
            .suggestions
            .iter()
            .find(|s| s.name == "At-risk-of-churn donors")
            .unwrap();
        assert_eq!(
            at_risk.criteria,
            Criteria {
                max_days_since_last_donation: Some(203),
                min_donation_count: Some(1),
                ..Criteria::default()
            }
        );

        assert_eq!(db.list_suggestions("org-1").unwrap().len(), 2);
    }

    #[test]
    fn test_rerun_replaces_pending_suggestions() {
        let mut db = grouped_db(6);
        let config = SegmentationConfig::default();
        generate_segment_suggestions(&mut db, "org-1", &config, &mut rng(), now()).unwrap();

        let report =
            generate_segment_suggestions(&mut db, "org-1", &config, &mut rng(), now()).unwrap();

        assert_eq!(report.replaced, 2);
        assert_eq!(db.list_suggestions("org-1").unwrap().len(), 2);
    }

    #[test]
    fn test_small_clusters_are_skipped() {
        let mut db = grouped_db(2);

        let report = generate_segment_suggestions(
            &mut db,
            "org-1",
            &SegmentationConfig::default(),
            &mut rng(),
            now(),
        )
        .unwrap();

        assert_eq!(report.cluster_count, 2);
        assert_eq!(report.skipped_clusters, 2);
        assert!(report.suggestions.is_empty());
        assert!(db.list_suggestions("org-1").unwrap().is_empty());
    }

    #[test]
    fn test_propensity_scores_are_stored() {
        let mut db = db_with_org();
        add_donor(&db, "fresh", Some(5), 1, 1200.0, 0.0);
        add_donor(&db, "never", None, 0, 0.0, 0.0);
        for (i, days) in [5, 40, 70].iter().enumerate() {
            db.insert_donation(
                "fresh",
                &Donation {
                    id: format!("don-{}", i),
                    amount: 400.0,
                    donated_at: now() - Duration::days(*days),
                },
                DONATION_COMPLETED,
            )
            .unwrap();
        }

        let report = update_propensity_scores(&mut db, Some("org-1"), now()).unwrap();
        assert_eq!(report.scored.len(), 2);

        // R=5 F=3 M=5: (2.0 + 0.9 + 1.5) / 5 * 100
        assert_eq!(db.get_donor("fresh").unwrap().unwrap().score, Some(88.0));
        assert_eq!(db.get_donor("never").unwrap().unwrap().score, Some(20.0));
    }

    #[test]
    fn test_scores_for_unknown_organization() {
        let mut db = db_with_org();
        let err = update_propensity_scores(&mut db, Some("ghost"), now()).unwrap_err();

        assert!(matches!(err, PipelineError::OrganizationNotFound(_)));
    }

    #[test]
    fn test_churn_predictions() {
        let mut db = db_with_org();
        add_donor(&db, "never", None, 0, 0.0, 0.0);
        add_donor(&db, "steady", Some(10), 12, 900.0, 70.0);
        db.insert_subscription("sub-1", "steady", SUBSCRIPTION_ACTIVE).unwrap();

        let report = predict_churn(&mut db, None, now()).unwrap();

        assert_eq!(report.predictions.len(), 2);
        assert_eq!(report.count(RiskTier::High), 1);
        assert_eq!(report.count(RiskTier::Low), 1);
        assert_eq!(report.high_risk().next().unwrap().donor_id, "never");

        let stored = db.get_donor("never").unwrap().unwrap().churn_probability.unwrap();
        assert!((stored - 0.85).abs() < 1e-9);
    }
}
