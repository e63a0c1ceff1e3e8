use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Environment;
use crate::errors::ProdGuardError;
use crate::models::{AggregatedSummary, CategoryResult};
use crate::monitor::TripReason;
use crate::pipeline::RunOutcome;
use crate::scoring::aggregate;

/// The JSON document a run exports. This shape is the stable boundary for
/// automation consuming results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub timestamp: DateTime<Utc>,
    pub environment: Environment,
    pub target: String,
    pub run_id: String,
    pub status: String,
    pub success: bool,
    #[serde(default)]
    pub duration_ms: u64,
    pub results: Vec<CategoryResult>,
    pub summary: AggregatedSummary,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_reason: Option<TripReason>,
}

impl ReportArtifact {
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        Self {
            timestamp: outcome.started_at,
            environment: outcome.environment,
            target: outcome.target.clone(),
            run_id: outcome.run_id.clone(),
            status: outcome.status.as_str().to_string(),
            success: outcome.success,
            duration_ms: outcome.duration_ms,
            results: outcome.results.clone(),
            summary: outcome.summary.clone(),
            errors: outcome.errors.clone(),
            trip_reason: outcome.trip_reason.clone(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("prodguard-report-{}.json", self.run_id)
    }

    pub fn to_json(&self) -> Result<String, ProdGuardError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self, ProdGuardError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Write into `dir` (created if needed) and return the file path.
    pub async fn write(&self, dir: &Path) -> Result<PathBuf, ProdGuardError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(self.file_name());
        tokio::fs::write(&path, self.to_json()?).await?;
        info!(path = %path.display(), "Wrote JSON report");
        Ok(path)
    }

    pub async fn load(path: &Path) -> Result<Self, ProdGuardError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    /// Recompute the summary from `results` alone.
    pub fn reaggregate(&self) -> AggregatedSummary {
        aggregate(&self.results)
    }
}
