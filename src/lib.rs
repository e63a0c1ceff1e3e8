//! Production-safe security validation.
//!
//! Runs categorized probes against a live deployment under a bounded
//! execution policy and an emergency-stop watchdog, then aggregates the
//! outcomes into a single security score with recommendations.

pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod monitor;
pub mod pipeline;
pub mod probes;
pub mod reporting;
pub mod runner;
pub mod scoring;
pub mod utils;

pub use errors::ProdGuardError;
pub use pipeline::{RunOutcome, TestOrchestrator};
