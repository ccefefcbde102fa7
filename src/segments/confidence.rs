use crate::clusterer::Cluster;

pub const MIN_CONFIDENCE: f64 = 0.3;
pub const MAX_CONFIDENCE: f64 = 1.0;
/// Mean variance at which confidence reaches zero before clamping.
pub const VARIANCE_SCALE: f64 = 10_000.0;

/// Cluster cohesion in `[0.3, 1.0]`.
///
/// Averages the population variance of each raw feature around the
/// centroid. The features are not rescaled first, so monetary spread
/// dominates the result.
pub fn cluster_confidence(cluster: &Cluster) -> f64 {
    if cluster.donors.is_empty() {
        return MAX_CONFIDENCE;
    }

    let c = &cluster.centroid;
    let n = cluster.donors.len() as f64;
    let mut sums = [0.0f64; 4];

    for d in &cluster.donors {
        sums[0] += (d.recency as f64 - c.recency).powi(2);
        sums[1] += (d.frequency as f64 - c.frequency).powi(2);
        sums[2] += (d.monetary - c.monetary).powi(2);
        sums[3] += (d.score - c.score).powi(2);
    }

    let avg_variance = sums.iter().map(|s| s / n).sum::<f64>() / 4.0;

    (1.0 - avg_variance / VARIANCE_SCALE).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}
