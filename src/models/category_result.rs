use serde::{Deserialize, Serialize};

use crate::probes::ProbeResult;

/// Per-category security evidence derived from its probe results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityMetrics {
    pub https_compliance: bool,
    pub certificate_valid: bool,
    pub security_headers_present: bool,
    pub waf_protection_active: bool,
    pub attacks_blocked: u32,
    pub vulnerabilities_found: u32,
    /// Share of tracked vulnerability classes found absent, in `[0, 1]`.
    pub security_score: f64,
}

impl SecurityMetrics {
    /// Metrics for a category that produced no evidence.
    pub fn unverified() -> Self {
        Self {
            https_compliance: true,
            certificate_valid: true,
            security_headers_present: true,
            waf_protection_active: true,
            attacks_blocked: 0,
            vulnerabilities_found: 0,
            security_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryStatus {
    /// Every critical probe succeeded.
    Passed,
    /// At least one critical probe failed.
    Failed,
    /// The category itself could not run (infrastructure error after retries).
    Errored,
    /// Not started because the run was aborted.
    Skipped,
}

impl CategoryStatus {
    pub fn ran(&self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

/// Outcome of running one category. Written once by the runner that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category_name: String,
    pub status: CategoryStatus,
    pub success: bool,
    pub probe_results: Vec<ProbeResult>,
    pub metrics: SecurityMetrics,
    pub tracked_vuln_classes: u32,
    pub duration_ms: u64,
    pub errors: Vec<String>,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

impl CategoryResult {
    pub fn skipped(category_name: &str, tracked_vuln_classes: u32) -> Self {
        Self {
            category_name: category_name.to_string(),
            status: CategoryStatus::Skipped,
            success: false,
            probe_results: Vec::new(),
            metrics: SecurityMetrics::unverified(),
            tracked_vuln_classes,
            duration_ms: 0,
            errors: Vec::new(),
            attempts: 0,
        }
    }

    pub fn errored(
        category_name: &str,
        tracked_vuln_classes: u32,
        errors: Vec<String>,
        attempts: u32,
        duration_ms: u64,
    ) -> Self {
        Self {
            category_name: category_name.to_string(),
            status: CategoryStatus::Errored,
            success: false,
            probe_results: Vec::new(),
            metrics: SecurityMetrics::unverified(),
            tracked_vuln_classes,
            duration_ms,
            errors,
            attempts,
        }
    }

    pub fn failed_probes(&self) -> impl Iterator<Item = &ProbeResult> {
        self.probe_results.iter().filter(|p| !p.success)
    }
}
