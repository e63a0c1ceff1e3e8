use super::metrics::category_score;
use super::recommendations;
use crate::models::{AggregatedSummary, CategoryResult, CategoryStatus};

/// Score used for a category in the overall mean; `None` when it did not run.
///
/// The score is recomputed from the vulnerability count rather than read
/// from the stored metrics. A category that errored scores zero.
pub fn effective_score(result: &CategoryResult) -> Option<f64> {
    match result.status {
        CategoryStatus::Skipped => None,
        CategoryStatus::Errored => Some(0.0),
        CategoryStatus::Passed | CategoryStatus::Failed => Some(category_score(
            result.tracked_vuln_classes,
            result.metrics.vulnerabilities_found,
        )),
    }
}

/// Aggregates category results into the run summary.
///
/// Pure: the same slice always yields the same summary, recommendation
/// order included. Skipped categories count toward `skipped_tests` and are
/// left out of the score mean.
pub fn aggregate(results: &[CategoryResult]) -> AggregatedSummary {
    let mut summary = AggregatedSummary {
        total_tests: results.len() as u32,
        ..Default::default()
    };

    let mut score_sum = 0.0;
    let mut scored = 0u32;

    for result in results {
        match result.status {
            CategoryStatus::Passed => summary.passed_tests += 1,
            CategoryStatus::Failed | CategoryStatus::Errored => summary.failed_tests += 1,
            CategoryStatus::Skipped => summary.skipped_tests += 1,
        }
        if let Some(score) = effective_score(result) {
            score_sum += score;
            scored += 1;
            summary.critical_issues += result.metrics.vulnerabilities_found;
        }
    }

    summary.overall_security_score = if scored == 0 {
        0.0
    } else {
        (score_sum / scored as f64).clamp(0.0, 1.0)
    };
    summary.recommendations = recommendations::generate(results, summary.overall_security_score);
    summary
}
