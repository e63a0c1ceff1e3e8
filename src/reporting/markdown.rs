use std::path::{Path, PathBuf};

use tracing::info;

use super::json::ReportArtifact;
use crate::errors::ProdGuardError;
use crate::models::{CategoryResult, CategoryStatus};
use crate::utils::formatting::{format_duration, format_score};

pub fn format_summary_table(report: &ReportArtifact) -> String {
    let s = &report.summary;
    format!(
        "## Summary\n\n| Metric | Value |\n|---|---|\n| Overall score | {} |\n| Categories | {} |\n| Passed | {} |\n| Failed | {} |\n| Skipped | {} |\n| Critical issues | {} |\n",
        format_score(s.overall_security_score),
        s.total_tests,
        s.passed_tests,
        s.failed_tests,
        s.skipped_tests,
        s.critical_issues,
    )
}

fn status_label(status: CategoryStatus) -> &'static str {
    match status {
        CategoryStatus::Passed => "PASS",
        CategoryStatus::Failed => "FAIL",
        CategoryStatus::Errored => "ERROR",
        CategoryStatus::Skipped => "SKIPPED",
    }
}

pub fn format_category_row(result: &CategoryResult) -> String {
    let score = if result.status.ran() {
        format_score(result.metrics.security_score)
    } else {
        "-".to_string()
    };
    format!(
        "| {} | {} | {} | {} | {} | {} |\n",
        result.category_name,
        status_label(result.status),
        score,
        result.metrics.vulnerabilities_found,
        result.metrics.attacks_blocked,
        format_duration(result.duration_ms),
    )
}

fn format_failed_probes(result: &CategoryResult) -> String {
    let mut out = String::new();
    for probe in result.failed_probes() {
        match &probe.error_message {
            Some(err) => out.push_str(&format!("- `{}`: error: {}\n", probe.name, err)),
            None => out.push_str(&format!("- `{}`: insecure\n", probe.name)),
        }
    }
    out
}

/// Human-readable rendering of a report artifact.
pub fn render(report: &ReportArtifact) -> String {
    let mut out = String::new();
    out.push_str("# Production Security Validation Report\n\n");
    out.push_str(&format!("- Target: {}\n", report.target));
    out.push_str(&format!("- Environment: {}\n", report.environment));
    out.push_str(&format!("- Run: {}\n", report.run_id));
    out.push_str(&format!("- Date: {}\n", report.timestamp.to_rfc3339()));
    out.push_str(&format!(
        "- Result: {} ({})\n\n",
        if report.success { "PASSED" } else { "FAILED" },
        report.status
    ));

    if let Some(reason) = &report.trip_reason {
        out.push_str(&format!("> Emergency stop: {}\n\n", reason));
    }

    out.push_str(&format_summary_table(report));
    out.push_str("\n## Categories\n\n| Category | Status | Score | Vulnerabilities | Attacks blocked | Duration |\n|---|---|---|---|---|---|\n");
    for result in &report.results {
        out.push_str(&format_category_row(result));
    }

    let with_failures: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.failed_probes().next().is_some() || !r.errors.is_empty())
        .collect();
    if !with_failures.is_empty() {
        out.push_str("\n## Findings\n");
        for result in with_failures {
            out.push_str(&format!("\n### {}\n\n", result.category_name));
            out.push_str(&format_failed_probes(result));
            if result.status == CategoryStatus::Errored {
                for err in &result.errors {
                    out.push_str(&format!("- {}\n", err));
                }
            }
        }
    }

    out.push_str("\n## Recommendations\n\n");
    for (i, rec) in report.summary.recommendations.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, rec));
    }

    if !report.errors.is_empty() {
        out.push_str("\n## Run Notes\n\n");
        for err in &report.errors {
            out.push_str(&format!("- {}\n", err));
        }
    }
    out
}

/// Write the Markdown rendering next to the JSON report.
pub async fn write(report: &ReportArtifact, dir: &Path) -> Result<PathBuf, ProdGuardError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("prodguard-report-{}.md", report.run_id));
    tokio::fs::write(&path, render(report)).await?;
    info!(path = %path.display(), "Wrote Markdown report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::models::SecurityMetrics;
    use crate::probes::{ProbeDetail, ProbeResult, SecurityControl};
    use crate::scoring::aggregate;

    fn report() -> ReportArtifact {
        let mut metrics = SecurityMetrics::unverified();
        metrics.vulnerabilities_found = 1;
        metrics.security_score = 0.75;
        metrics.waf_protection_active = false;
        let results = vec![
            CategoryResult {
                category_name: "https".into(),
                status: CategoryStatus::Passed,
                success: true,
                probe_results: vec![ProbeResult {
                    name: "waf-detection".into(),
                    control: SecurityControl::Waf,
                    success: false,
                    blocked_attacks: None,
                    detail: ProbeDetail::Waf { active: false, status: Some(200) },
                    error_message: None,
                    duration_ms: 12,
                }],
                metrics,
                tracked_vuln_classes: 4,
                duration_ms: 1_200,
                errors: Vec::new(),
                attempts: 1,
            },
            CategoryResult::skipped("rate-limiting", 2),
        ];
        ReportArtifact {
            timestamp: chrono::Utc::now(),
            environment: Environment::Staging,
            target: "https://shop.example.com/".into(),
            run_id: "abc".into(),
            status: "aborted".into(),
            success: false,
            duration_ms: 1_200,
            summary: aggregate(&results),
            results,
            errors: Vec::new(),
            trip_reason: None,
        }
    }

    #[test]
    fn test_render_contains_tables_and_findings() {
        let md = render(&report());
        assert!(md.contains("| Overall score | 75% |"));
        assert!(md.contains("| https | PASS | 75% | 1 | 0 | 1.2s |"));
        assert!(md.contains("| rate-limiting | SKIPPED | - |"));
        assert!(md.contains("- `waf-detection`: insecure"));
        assert!(md.contains("## Recommendations"));
    }

    #[tokio::test]
    async fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&report(), dir.path()).await.unwrap();
        assert!(path.ends_with("prodguard-report-abc.md"));
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.starts_with("# Production Security Validation Report"));
    }
}
