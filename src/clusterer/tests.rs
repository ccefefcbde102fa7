use super::*;
use crate::features::{DonorFeatures, FeatureVector};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

fn donor(id: &str, recency: i64, frequency: u32, monetary: f64, score: f64) -> DonorFeatures {
    DonorFeatures {
        id: id.to_string(),
        recency,
        frequency,
        monetary,
        score,
        is_active: true,
    }
}

fn run(donors: &[DonorFeatures], k: usize, seed: u64) -> ClusterResult {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    kmeans(donors, k, &KmeansParams::default(), &mut rng)
}

#[test]
fn test_distance_identity_and_symmetry() {
    let a = FeatureVector::new(12.0, 3.0, 450.0, 61.0);
    let b = FeatureVector::new(200.0, 1.0, 40.0, 15.0);

    assert_eq!(distance(&a, &a), 0.0);
    assert_eq!(distance(&a, &b), distance(&b, &a));
    assert!(distance(&a, &b) > 0.0);
}

#[test]
fn test_distance_saturates_above_caps() {
    let stale = FeatureVector::new(400.0, 80.0, 25_000.0, 10.0);
    let never = FeatureVector::new(9999.0, 50.0, 10_000.0, 10.0);

    assert_eq!(distance(&stale, &never), 0.0);
}

#[test]
fn test_distance_maximum_is_two() {
    let low = FeatureVector::new(0.0, 0.0, 0.0, 0.0);
    let high = FeatureVector::new(9999.0, 500.0, 1e9, 100.0);

    assert!((distance(&low, &high) - 2.0).abs() < 1e-12);
}

#[test]
fn test_distance_score_is_not_clamped() {
    let a = FeatureVector::new(0.0, 0.0, 0.0, 0.0);
    let b = FeatureVector::new(0.0, 0.0, 0.0, 200.0);

    assert!((distance(&a, &b) - 2.0).abs() < 1e-12);
}

#[test]
fn test_custom_normalization() {
    let norm = Normalization {
        max_monetary: 1000.0,
        ..Normalization::default()
    };
    let a = FeatureVector::new(0.0, 0.0, 0.0, 0.0);
    let b = FeatureVector::new(0.0, 0.0, 500.0, 0.0);

    assert!((norm.distance(&a, &b) - 0.5).abs() < 1e-12);
    assert!((distance(&a, &b) - 0.05).abs() < 1e-12);
}

#[test]
fn test_compute_centroid() {
    let members = vec![donor("a", 10, 2, 100.0, 40.0), donor("b", 30, 4, 300.0, 60.0)];

    assert_eq!(
        compute_centroid(&members),
        Some(FeatureVector::new(20.0, 3.0, 200.0, 50.0))
    );
    assert_eq!(compute_centroid(&Vec::<DonorFeatures>::new()), None);
}

#[test]
fn test_empty_input_returns_no_clusters() {
    let res = run(&[], 5, 7);

    assert!(res.clusters.is_empty());
    assert_eq!(res.iterations, 0);
}

#[test]
fn test_single_donor_reduces_k() {
    let donors = vec![donor("only", 9999, 0, 0.0, 0.0)];
    let res = run(&donors, 5, 7);

    assert_eq!(res.clusters.len(), 1);
    assert_eq!(res.clusters[0].donors, donors);
    assert_eq!(res.clusters[0].centroid, FeatureVector::new(9999.0, 0.0, 0.0, 0.0));
}

#[test]
fn test_identical_donors_collapse_to_first_cluster() {
    let donors: Vec<_> = (0..6)
        .map(|i| donor(&format!("d{}", i), 20, 2, 150.0, 40.0))
        .collect();
    let res = run(&donors, 3, 11);

    assert_eq!(res.clusters.len(), 1);
    assert_eq!(res.clusters[0].id, "cluster-0");
    assert_eq!(res.clusters[0].len(), 6);
}

#[test]
fn test_separated_groups_are_recovered() {
    let mut donors = Vec::new();
    for i in 0..5 {
        donors.push(donor(&format!("recent-{}", i), 5 + i, 12, 4000.0, 90.0));
    }
    for i in 0..5 {
        donors.push(donor(&format!("lapsed-{}", i), 9999, 0, 0.0, (2 + i * 3) as f64));
    }

    for seed in [1, 2, 3, 42] {
        let res = run(&donors, 2, seed);
        assert_eq!(res.clusters.len(), 2);

        for cluster in &res.clusters {
            assert_eq!(cluster.len(), 5);
            let prefix = cluster.donors[0].id.split('-').next().unwrap().to_string();
            assert!(cluster.donors.iter().all(|d| d.id.starts_with(&prefix)));
        }
    }
}

#[test]
fn test_cluster_members_keep_input_order() {
    let donors = vec![
        donor("a", 1, 10, 5000.0, 95.0),
        donor("b", 9999, 0, 0.0, 0.0),
        donor("c", 2, 11, 5100.0, 92.0),
        donor("d", 9999, 0, 0.0, 1.0),
    ];
    let res = run(&donors, 2, 3);

    for cluster in &res.clusters {
        let ids: Vec<&str> = cluster.donors.iter().map(|d| d.id.as_str()).collect();
        assert!(ids == ["a", "c"] || ids == ["b", "d"], "unexpected {:?}", ids);
    }
}

#[test]
fn test_iteration_cap() {
    let donors: Vec<_> = (0..30)
        .map(|i| donor(&format!("d{}", i), i * 13, (i % 7) as u32, i as f64 * 97.0, (i * 3) as f64))
        .collect();
    let params = KmeansParams {
        max_iterations: 2,
        ..KmeansParams::default()
    };
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let res = kmeans(&donors, 4, &params, &mut rng);

    assert!(res.iterations <= 2);
    let total: usize = res.clusters.iter().map(Cluster::len).sum();
    assert_eq!(total, 30);
}

#[test]
fn test_same_seed_same_result() {
    let donors: Vec<_> = (0..40)
        .map(|i| donor(&format!("d{}", i), (i * 37) % 400, (i % 9) as u32, (i * 211 % 3000) as f64, (i * 7 % 100) as f64))
        .collect();

    let a = run(&donors, 4, 99);
    let b = run(&donors, 4, 99);
    assert_eq!(a.clusters, b.clusters);
}

#[test]
fn test_choose_k() {
    assert_eq!(choose_k(0, 2, 5, 10), 2);
    assert_eq!(choose_k(15, 2, 5, 10), 2);
    assert_eq!(choose_k(30, 2, 5, 10), 3);
    assert_eq!(choose_k(49, 2, 5, 10), 4);
    assert_eq!(choose_k(1000, 2, 5, 10), 5);
    assert_eq!(choose_k(1000, 2, 5, 0), 2);
}

fn feature_strategy() -> impl Strategy<Value = FeatureVector> {
    (0.0..20_000.0f64, 0.0..200.0f64, 0.0..50_000.0f64, 0.0..=100.0f64)
        .prop_map(|(r, f, m, s)| FeatureVector::new(r, f, m, s))
}

fn donors_strategy() -> impl Strategy<Value = Vec<DonorFeatures>> {
    prop::collection::vec((0i64..20_000, 0u32..200, 0.0..50_000.0f64, 0.0..=100.0f64), 0..60)
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (r, f, m, s))| donor(&format!("d{}", i), r, f, m, s))
                .collect()
        })
}

proptest! {
    #[test]
    fn distance_is_symmetric(a in feature_strategy(), b in feature_strategy()) {
        prop_assert_eq!(distance(&a, &b), distance(&b, &a));
        prop_assert_eq!(distance(&a, &a), 0.0);
    }

    #[test]
    fn distance_is_bounded(a in feature_strategy(), b in feature_strategy()) {
        let d = distance(&a, &b);
        prop_assert!((0.0..=2.0 + 1e-12).contains(&d));
    }

    #[test]
    fn cluster_count_is_bounded(donors in donors_strategy(), k in 1usize..8, seed in any::<u64>()) {
        let res = run(&donors, k, seed);
        prop_assert!(res.clusters.len() <= k.min(donors.len()));
        if !donors.is_empty() {
            prop_assert!(!res.clusters.is_empty());
        }
        prop_assert!(res.iterations <= 20);
    }

    #[test]
    fn every_donor_assigned_once(donors in donors_strategy(), k in 1usize..8, seed in any::<u64>()) {
        let res = run(&donors, k, seed);
        let assigned: Vec<&str> = res
            .clusters
            .iter()
            .flat_map(|c| c.donors.iter().map(|d| d.id.as_str()))
            .collect();
        let unique: HashSet<&str> = assigned.iter().copied().collect();
        let expected: HashSet<&str> = donors.iter().map(|d| d.id.as_str()).collect();

        prop_assert_eq!(assigned.len(), donors.len());
        prop_assert_eq!(unique, expected);
    }
}
