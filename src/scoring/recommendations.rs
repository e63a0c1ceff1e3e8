use crate::models::{CategoryResult, CategoryStatus, SecurityMetrics};
use crate::probes::SecurityControl;

pub const BANNER_EMERGENCY: &str =
    "URGENT: security posture is critical; remediate the findings below before the next release";
pub const BANNER_IMPROVE: &str =
    "Security posture needs improvement; prioritise the findings below";
pub const BANNER_MINOR: &str =
    "Security posture is good with minor gaps; schedule the fixes below";

pub const MAINTAIN_POSTURE: &str =
    "Maintain the current security posture and re-run this validation after every deployment";

pub const NOTHING_COMPLETED: &str =
    "No category completed; re-run the validation once the run can finish";

pub const BEST_PRACTICES: [&str; 2] = [
    "Rotate TLS certificates and credentials on a fixed schedule",
    "Run production security validation regularly and after every infrastructure change",
];

const HTTPS_COMPLIANCE: &str = "Enforce HTTPS by redirecting all plain-HTTP requests";
const CERTIFICATE_VALID: &str = "Renew or replace the TLS certificate with one from a trusted CA";
const SECURITY_HEADERS: &str =
    "Add the missing security headers (HSTS, CSP, X-Frame-Options, X-Content-Type-Options)";
const WAF_ACTIVE: &str = "Enable WAF protection in front of the endpoint";

/// Banner for an overall score, if it falls in one of the warning bands.
pub fn score_banner(overall_security_score: f64) -> Option<&'static str> {
    if overall_security_score < 0.5 {
        Some(BANNER_EMERGENCY)
    } else if overall_security_score < 0.7 {
        Some(BANNER_IMPROVE)
    } else if overall_security_score < 0.9 {
        Some(BANNER_MINOR)
    } else {
        None
    }
}

fn metric_recommendations(metrics: &SecurityMetrics) -> impl Iterator<Item = &'static str> {
    [
        (metrics.https_compliance, HTTPS_COMPLIANCE),
        (metrics.certificate_valid, CERTIFICATE_VALID),
        (metrics.security_headers_present, SECURITY_HEADERS),
        (metrics.waf_protection_active, WAF_ACTIVE),
    ]
    .into_iter()
    .filter(|(ok, _)| !ok)
    .map(|(_, text)| text)
}

/// Recommendation for a failed probe whose control has no metric flag.
fn control_recommendation(control: SecurityControl, probe: &str, category: &str) -> Option<String> {
    match control {
        // Covered by the metric flags.
        SecurityControl::HttpsEnforcement
        | SecurityControl::Certificate
        | SecurityControl::SecurityHeaders
        | SecurityControl::Waf => None,
        SecurityControl::InjectionDefense => {
            Some("Harden input validation and WAF rules against injection payloads".into())
        }
        SecurityControl::RateLimiting => {
            Some("Enforce request rate limiting on public endpoints".into())
        }
        SecurityControl::AccessRestriction => {
            Some("Restrict access to administrative endpoints and sensitive files".into())
        }
        SecurityControl::Monitoring => {
            Some("Enable access logging and security alerting for the endpoint".into())
        }
        SecurityControl::Other => {
            Some(format!("Review the failed '{}' check in the '{}' category", probe, category))
        }
    }
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// Deterministic, template-driven recommendation list.
///
/// Order: optional score banner, issue recommendations in category and probe
/// order (or the single "maintain" line when there are none), then the fixed
/// best practices. Duplicates are collapsed to their first occurrence.
pub fn generate(results: &[CategoryResult], overall_security_score: f64) -> Vec<String> {
    let mut issues = Vec::new();
    let mut any_ran = false;

    for result in results {
        match result.status {
            CategoryStatus::Skipped => continue,
            CategoryStatus::Errored => {
                any_ran = true;
                push_unique(&mut issues, format!(
                    "Investigate the infrastructure errors that stopped the '{}' checks from running",
                    result.category_name
                ));
                continue;
            }
            CategoryStatus::Passed | CategoryStatus::Failed => any_ran = true,
        }

        for text in metric_recommendations(&result.metrics) {
            push_unique(&mut issues, text.to_string());
        }
        for probe in result.failed_probes() {
            if let Some(text) = control_recommendation(probe.control, &probe.name, &result.category_name) {
                push_unique(&mut issues, text);
            }
        }
    }

    let mut recommendations = Vec::new();
    if !any_ran {
        push_unique(&mut recommendations, NOTHING_COMPLETED.to_string());
    } else if let Some(banner) = score_banner(overall_security_score) {
        push_unique(&mut recommendations, banner.to_string());
    }

    if issues.is_empty() {
        if any_ran {
            push_unique(&mut recommendations, MAINTAIN_POSTURE.to_string());
        }
    } else {
        for issue in issues {
            push_unique(&mut recommendations, issue);
        }
    }

    for practice in BEST_PRACTICES {
        push_unique(&mut recommendations, practice.to_string());
    }
    recommendations
}
