use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::clusterer::{choose_k, KmeansParams, Normalization};
use crate::segments::DEFAULT_CURRENCY;

/// Tunables for a segmentation run. Every field has a default, so a
/// config file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub normalization: Normalization,
    pub max_iterations: usize,
    pub convergence_threshold: f64,
    pub min_clusters: usize,
    pub max_clusters: usize,
    pub donors_per_cluster: usize,
    /// Clusters smaller than this produce no suggestion.
    pub min_segment_size: usize,
    /// Base currency shown in segment descriptions.
    pub currency: String,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            normalization: Normalization::default(),
            max_iterations: 20,
            convergence_threshold: 0.01,
            min_clusters: 2,
            max_clusters: 5,
            donors_per_cluster: 10,
            min_segment_size: 3,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

impl SegmentationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .context(format!("Failed to parse config file {}", path.display()))
    }

    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn cluster_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_clusters = min;
        self.max_clusters = max;
        self
    }

    pub fn min_segment_size(mut self, size: usize) -> Self {
        self.min_segment_size = size;
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn kmeans_params(&self) -> KmeansParams {
        KmeansParams {
            max_iterations: self.max_iterations,
            convergence_threshold: self.convergence_threshold,
            normalization: self.normalization,
        }
    }

    pub fn cluster_count(&self, donor_count: usize) -> usize {
        choose_k(
            donor_count,
            self.min_clusters,
            self.max_clusters,
            self.donors_per_cluster,
        )
    }
}
