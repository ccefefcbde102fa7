// Public API exports
pub mod clusterer;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod scoring;
pub mod segments;

// Re-export main types for convenience
pub use clusterer::{distance, kmeans, Cluster, ClusterResult, KmeansParams, Normalization};
pub use config::SegmentationConfig;
pub use db::{DonorDB, Organization};
pub use error::PipelineError;
pub use features::{extract_features, DonorFeatures, DonorRecord, FeatureVector};
pub use pipeline::{
    generate_segment_suggestions, predict_churn, update_propensity_scores, ChurnReport,
    ScoreReport, SuggestionReport,
};
pub use scoring::{churn_probability, propensity_score, RiskTier};
pub use segments::{classify, Criteria, SegmentClassifier, SegmentProfile, SegmentSuggestion};
