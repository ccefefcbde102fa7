use serde::{Deserialize, Serialize};

use crate::clusterer::similarity::Normalization;
use crate::features::{DonorFeatures, FeatureVector};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    /// `cluster-<index>`, where index is the centroid slot.
    pub id: String,
    pub donors: Vec<DonorFeatures>,
    pub centroid: FeatureVector,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.donors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.donors.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ClusterResult {
    pub clusters: Vec<Cluster>,
    pub iterations: usize,
}

/// Termination and scaling knobs for `kmeans`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KmeansParams {
    pub max_iterations: usize,
    /// A centroid moving less than this (in normalized distance) counts as settled.
    pub convergence_threshold: f64,
    pub normalization: Normalization,
}

impl Default for KmeansParams {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            convergence_threshold: 0.01,
            normalization: Normalization::default(),
        }
    }
}
