//! Similarity metrics used to score a candidate alignment.

pub mod trait_;
pub mod mse;

pub use trait_::Metric;
pub use mse::MeanSquaredError;
