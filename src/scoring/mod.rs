//! Per-donor scores computed ahead of segmentation: the RFM propensity
//! score consumed as the `score` feature, and churn probability.

mod churn;
mod propensity;


pub use churn::{churn_factors, churn_probability, ChurnFactors, DonationTrend, RiskTier};
pub use propensity::{propensity_score, rfm_score, RfmScore};
