//! Turns probe and category outcomes into scores and recommendations.
//!
//! Everything here is a pure function of its input.

pub mod metrics;
pub mod aggregator;
pub mod recommendations;

pub use metrics::{category_score, derive_metrics};
pub use aggregator::aggregate;
