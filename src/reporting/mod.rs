//! Report artifacts produced at the end of a run.

pub mod json;
pub mod markdown;

pub use json::ReportArtifact;
