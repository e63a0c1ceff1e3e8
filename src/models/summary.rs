use serde::{Deserialize, Serialize};

/// Run-wide totals computed once from every category result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSummary {
    pub total_tests: u32,
    pub passed_tests: u32,
    pub failed_tests: u32,
    pub skipped_tests: u32,
    pub overall_security_score: f64,
    pub critical_issues: u32,
    pub recommendations: Vec<String>,
}

impl AggregatedSummary {
    pub fn is_consistent(&self) -> bool {
        self.total_tests == self.passed_tests + self.failed_tests + self.skipped_tests
            && (0.0..=1.0).contains(&self.overall_security_score)
    }
}
