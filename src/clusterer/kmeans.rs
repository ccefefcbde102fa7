use rand::Rng;
use tracing::debug;

use crate::clusterer::{
    centroid::compute_centroid,
    similarity::Normalization,
    types::{Cluster, ClusterResult, KmeansParams},
};
use crate::features::{DonorFeatures, FeatureVector};

/// Partition `donors` into at most `k` clusters.
///
/// Initial centroids are `k` distinct donors drawn from `rng`, so results
/// vary between runs unless the caller passes a seeded generator. Empty
/// clusters are dropped from the result.
pub fn kmeans<R>(
    donors: &[DonorFeatures],
    k: usize,
    params: &KmeansParams,
    rng: &mut R,
) -> ClusterResult
where
    R: Rng + ?Sized,
{
    let n = donors.len();
    if n == 0 {
        return ClusterResult {
            clusters: Vec::new(),
            iterations: 0,
        };
    }
    let k = k.clamp(1, n);
    let points: Vec<FeatureVector> = donors.iter().map(DonorFeatures::vector).collect();

    // 1. Pick k distinct donors as initial centers
    let mut centroids: Vec<FeatureVector> = rand::seq::index::sample(rng, n, k)
        .into_iter()
        .map(|i| points[i])
        .collect();

    let mut assignments = vec![0usize; n];
    let mut iterations = 0;

    for _ in 0..params.max_iterations.max(1) {
        iterations += 1;

        // 2. Assign each donor to the nearest centroid
        for (i, point) in points.iter().enumerate() {
            assignments[i] = nearest(point, &centroids, &params.normalization);
        }

        // 3. Recompute centroids; empty clusters keep the previous one
        let mut moved = false;
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members = donors
                .iter()
                .zip(assignments.iter())
                .filter(|&(_, a)| *a == c)
                .map(|(d, _)| d);

            if let Some(updated) = compute_centroid(members) {
                let shift = params.normalization.distance(centroid, &updated);
                if shift > params.convergence_threshold {
                    moved = true;
                }
                *centroid = updated;
            }
        }

        debug!(iteration = iterations, moved, "k-means pass");

        if !moved {
            break; // converged
        }
    }

    // 4. Build result clusters in input order
    let mut clusters: Vec<Cluster> = (0..k)
        .map(|c| Cluster {
            id: format!("cluster-{}", c),
            donors: Vec::new(),
            centroid: centroids[c],
        })
        .collect();

    for (donor, &c) in donors.iter().zip(assignments.iter()) {
        clusters[c].donors.push(donor.clone());
    }

    clusters.retain(|c| !c.donors.is_empty());

    ClusterResult {
        clusters,
        iterations,
    }
}

/// Index of the strictly closest centroid; the first one wins ties.
fn nearest(point: &FeatureVector, centroids: &[FeatureVector], norm: &Normalization) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;

    for (c, center) in centroids.iter().enumerate() {
        let d = norm.distance(point, center);
        if d < best_distance {
            best = c;
            best_distance = d;
        }
    }

    best
}

/// Cluster count for a batch: one cluster per `donors_per_cluster` donors,
/// bounded to `[min_clusters, max_clusters]`.
pub fn choose_k(
    donor_count: usize,
    min_clusters: usize,
    max_clusters: usize,
    donors_per_cluster: usize,
) -> usize {
    let by_size = donor_count.checked_div(donors_per_cluster).unwrap_or(0);
    by_size.max(min_clusters).min(max_clusters)
}
