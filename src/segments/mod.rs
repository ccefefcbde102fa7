mod classifier;
mod confidence;
mod types;


pub use classifier::{classify, SegmentClassifier, DEFAULT_CURRENCY};
pub use confidence::{cluster_confidence, MAX_CONFIDENCE, MIN_CONFIDENCE, VARIANCE_SCALE};
pub use types::{Criteria, SegmentKind, SegmentProfile, SegmentSuggestion};
