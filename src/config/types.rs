use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::presets::Environment;
use crate::runner::ConcurrencyMode;

/// On-disk configuration. Every field is optional; unset values fall back to
/// the environment preset.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProdGuardConfig {
    pub environment: Option<Environment>,
    pub target: Option<String>,
    pub execution: Option<ExecutionConfig>,
    pub emergency_stop: Option<EmergencyStopFileConfig>,
    pub probes: Option<ProbesConfig>,
    pub categories: Option<BTreeMap<String, CategoryConfig>>,
    pub control_plane: Option<ControlPlaneConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ExecutionConfig {
    pub order: Option<Vec<String>>,
    pub concurrency: Option<ConcurrencyConfig>,
    pub retry: Option<RetryConfig>,
    pub read_only: Option<bool>,
    pub dry_run: Option<bool>,
    pub pass_threshold: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ConcurrencyConfig {
    pub mode: Option<ConcurrencyMode>,
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RetryConfig {
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EmergencyStopFileConfig {
    pub max_test_duration_ms: Option<u64>,
    pub resource_threshold: Option<f64>,
    pub cost_threshold_usd: Option<f64>,
    pub auto_stop_enabled: Option<bool>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProbesConfig {
    pub timeout_ms: Option<u64>,
    pub flood_timeout_ms: Option<u64>,
    pub rate_limit_requests: Option<u32>,
    pub cost_per_request_usd: Option<f64>,
    /// Requests in flight that count as full resource usage.
    pub request_capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CategoryConfig {
    pub critical_probes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlPlaneConfig {
    pub endpoint: String,
    /// Literal token or `$VAR` reference resolved from the environment.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OutputConfig {
    pub directory: Option<String>,
    pub markdown: Option<bool>,
}
