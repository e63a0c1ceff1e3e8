use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Environment;
use crate::models::{AggregatedSummary, CategoryResult, CategoryStatus};
use crate::monitor::TripReason;

/// Where the orchestrator is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    Running { category_index: usize },
    /// Every category in the execution order ran.
    Completed,
    /// The emergency stop was set; later categories were skipped.
    Aborted,
    /// The orchestrator itself hit an unhandled error.
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running { .. } => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }
}

/// Live view of a run, readable while it executes.
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    pub status: RunStatus,
    pub current_category: Option<String>,
    pub completed_categories: Vec<String>,
    pub start_time: DateTime<Utc>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            status: RunStatus::NotStarted,
            current_category: None,
            completed_categories: Vec::new(),
            start_time: Utc::now(),
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Final verdict of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub environment: Environment,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub status: RunStatus,
    pub success: bool,
    /// One entry per category, in execution order.
    pub results: Vec<CategoryResult>,
    pub summary: AggregatedSummary,
    /// Run-level notes: retries, cleanup failures, unhandled errors.
    pub errors: Vec<String>,
    pub trip_reason: Option<TripReason>,
    pub duration_ms: u64,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }

    pub fn result(&self, category: &str) -> Option<&CategoryResult> {
        self.results.iter().find(|r| r.category_name == category)
    }

    pub fn aborted(&self) -> bool {
        self.status == RunStatus::Aborted
    }

    pub fn skipped_categories(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| r.status == CategoryStatus::Skipped)
            .map(|r| r.category_name.as_str())
    }
}

/// A run succeeds only if it finished, nothing failed, and the score clears the bar.
pub fn run_succeeded(status: RunStatus, results: &[CategoryResult], summary: &AggregatedSummary, pass_threshold: f64) -> bool {
    status == RunStatus::Completed
        && results.iter().all(|r| r.status == CategoryStatus::Passed)
        && summary.overall_security_score >= pass_threshold
}
