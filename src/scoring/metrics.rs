use crate::models::SecurityMetrics;
use crate::probes::{ProbeResult, SecurityControl};

/// `(tracked - found) / tracked`, clamped to `[0, 1]`.
pub fn category_score(tracked_vuln_classes: u32, vulnerabilities_found: u32) -> f64 {
    if tracked_vuln_classes == 0 {
        return if vulnerabilities_found == 0 { 1.0 } else { 0.0 };
    }
    let tracked = tracked_vuln_classes as f64;
    ((tracked - vulnerabilities_found as f64) / tracked).clamp(0.0, 1.0)
}

/// Builds the category metrics from its probe results.
///
/// A control flag is false as soon as any probe for that control failed,
/// whatever the reason. Every failed probe counts as one vulnerability.
pub fn derive_metrics(results: &[ProbeResult], tracked_vuln_classes: u32) -> SecurityMetrics {
    let control_ok = |control: SecurityControl| {
        !results.iter().any(|r| r.control == control && !r.success)
    };

    let vulnerabilities_found = results.iter().filter(|r| !r.success).count() as u32;
    let attacks_blocked = results.iter().filter_map(|r| r.blocked_attacks).sum();

    SecurityMetrics {
        https_compliance: control_ok(SecurityControl::HttpsEnforcement),
        certificate_valid: control_ok(SecurityControl::Certificate),
        security_headers_present: control_ok(SecurityControl::SecurityHeaders),
        waf_protection_active: control_ok(SecurityControl::Waf),
        attacks_blocked,
        vulnerabilities_found,
        security_score: category_score(tracked_vuln_classes, vulnerabilities_found),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::ProbeDetail;

    fn probe(name: &str, control: SecurityControl, success: bool, blocked: Option<u32>) -> ProbeResult {
        ProbeResult {
            name: name.to_string(),
            control,
            success,
            blocked_attacks: blocked,
            detail: ProbeDetail::Custom { data: serde_json::Value::Null },
            error_message: None,
            duration_ms: 1,
        }
    }

    fn https_probes(all_pass: bool) -> Vec<ProbeResult> {
        vec![
            probe("https-redirect", SecurityControl::HttpsEnforcement, all_pass, None),
            probe("tls-certificate", SecurityControl::Certificate, all_pass, None),
            probe("security-headers", SecurityControl::SecurityHeaders, all_pass, None),
            probe("waf-detection", SecurityControl::Waf, all_pass, None),
        ]
    }

    #[test]
    fn test_all_https_controls_pass() {
        let metrics = derive_metrics(&https_probes(true), 4);
        assert!(metrics.https_compliance);
        assert!(metrics.certificate_valid);
        assert!(metrics.security_headers_present);
        assert!(metrics.waf_protection_active);
        assert_eq!(metrics.attacks_blocked, 0);
        assert_eq!(metrics.vulnerabilities_found, 0);
        assert_eq!(metrics.security_score, 1.0);
    }

    #[test]
    fn test_all_https_controls_fail() {
        let metrics = derive_metrics(&https_probes(false), 4);
        assert!(!metrics.https_compliance);
        assert!(!metrics.certificate_valid);
        assert!(!metrics.security_headers_present);
        assert!(!metrics.waf_protection_active);
        assert_eq!(metrics.vulnerabilities_found, 4);
        assert_eq!(metrics.security_score, 0.0);
    }

    #[test]
    fn test_blocked_attacks_are_summed() {
        let results = vec![
            probe("sql-injection", SecurityControl::InjectionDefense, true, Some(4)),
            probe("xss", SecurityControl::InjectionDefense, true, Some(2)),
            probe("path-traversal", SecurityControl::InjectionDefense, false, Some(1)),
            probe("command-injection", SecurityControl::InjectionDefense, true, None),
        ];
        let metrics = derive_metrics(&results, 4);
        assert_eq!(metrics.attacks_blocked, 7);
        assert_eq!(metrics.vulnerabilities_found, 1);
        assert_eq!(metrics.security_score, 0.75);
        assert!(metrics.https_compliance);
    }

    #[test]
    fn test_score_is_clamped() {
        assert_eq!(category_score(2, 5), 0.0);
        assert_eq!(category_score(4, 0), 1.0);
        assert_eq!(category_score(0, 0), 1.0);
        assert_eq!(category_score(0, 1), 0.0);
    }
}
