use crate::features::{DonorFeatures, FeatureVector};

/// Arithmetic mean of the members' features, or `None` for an empty cluster.
pub fn compute_centroid<'a, I>(members: I) -> Option<FeatureVector>
where
    I: IntoIterator<Item = &'a DonorFeatures>,
{
    let mut out = FeatureVector::default();
    let mut n = 0usize;

    for d in members {
        out.recency += d.recency as f64;
        out.frequency += d.frequency as f64;
        out.monetary += d.monetary;
        out.score += d.score;
        n += 1;
    }

    if n == 0 {
        return None;
    }

    let n = n as f64;
    out.recency /= n;
    out.frequency /= n;
    out.monetary /= n;
    out.score /= n;

    Some(out)
}
