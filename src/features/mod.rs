mod extract;
mod types;


pub use extract::{extract_features, NEVER_DONATED_RECENCY};
pub use types::{Donation, DonorFeatures, DonorRecord, FeatureVector};
