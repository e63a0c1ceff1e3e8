use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::attack::{injection_simulation, AttackClass};
use super::{access, https, monitoring, rate_limit, Probe};
use crate::errors::ProdGuardError;

/// The built-in probe categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryKind {
    Https,
    AttackResistance,
    RateLimiting,
    AccessControl,
    Monitoring,
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 5] = [
        CategoryKind::Https,
        CategoryKind::AttackResistance,
        CategoryKind::RateLimiting,
        CategoryKind::AccessControl,
        CategoryKind::Monitoring,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::AttackResistance => "attack-resistance",
            Self::RateLimiting => "rate-limiting",
            Self::AccessControl => "access-control",
            Self::Monitoring => "monitoring",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Https => "HTTPS & Transport Security",
            Self::AttackResistance => "Attack Resistance",
            Self::RateLimiting => "Rate Limiting",
            Self::AccessControl => "Access Control",
            Self::Monitoring => "Logging & Alerting",
        }
    }

    /// Number of vulnerability classes the category's score is normalised by.
    pub fn max_tracked_vuln_classes(&self) -> u32 {
        match self {
            Self::Https => 4,
            Self::AttackResistance => 4,
            Self::RateLimiting => 2,
            Self::AccessControl => 3,
            Self::Monitoring => 2,
        }
    }

    /// Probes whose failure fails the category unless configuration overrides it.
    pub fn default_critical_probes(&self) -> &'static [&'static str] {
        match self {
            Self::Https => &["https-redirect", "tls-certificate"],
            Self::AttackResistance => &["sql-injection", "xss"],
            Self::RateLimiting => &["rate-limit-flood"],
            Self::AccessControl => &["admin-endpoints", "sensitive-files"],
            Self::Monitoring => &["access-logging"],
        }
    }

    /// Whether the category needs a control plane to run.
    pub fn requires_control_plane(&self) -> bool {
        matches!(self, Self::Monitoring)
    }

    pub fn probes(&self, timeouts: &ProbeTimeouts) -> Vec<Arc<dyn Probe>> {
        let t = timeouts.probe;
        match self {
            Self::Https => vec![
                Arc::new(https::https_redirect(t)),
                Arc::new(https::tls_certificate(t)),
                Arc::new(https::security_headers(t)),
                Arc::new(https::waf_detection(t)),
            ],
            Self::AttackResistance => AttackClass::ALL
                .iter()
                .map(|class| Arc::new(injection_simulation(*class, t)) as Arc<dyn Probe>)
                .collect(),
            Self::RateLimiting => vec![
                Arc::new(rate_limit::rate_limit_flood(timeouts.flood)),
                Arc::new(rate_limit::rate_limit_headers(t)),
            ],
            Self::AccessControl => vec![
                Arc::new(access::admin_endpoints(t)),
                Arc::new(access::sensitive_files(t)),
                Arc::new(access::directory_listing(t)),
            ],
            Self::Monitoring => vec![
                Arc::new(monitoring::access_logging(t)),
                Arc::new(monitoring::security_alarms(t)),
            ],
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryKind {
    type Err = ProdGuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProdGuardError::Config(format!("Unknown category: {}", s)))
    }
}

/// Per-probe time limits used when building the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTimeouts {
    pub probe: Duration,
    /// Long-running flood probes get their own, larger bound.
    pub flood: Duration,
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(10),
            flood: Duration::from_secs(60),
        }
    }
}
