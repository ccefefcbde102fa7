mod centroid;
mod kmeans;
mod similarity;
mod types;

#[cfg(test)]
mod tests;

pub use centroid::compute_centroid;
pub use kmeans::{choose_k, kmeans};
pub use similarity::{
    distance, Normalization, MAX_FREQUENCY, MAX_MONETARY, MAX_RECENCY_DAYS, MAX_SCORE,
};
pub use types::{Cluster, ClusterResult, KmeansParams};
