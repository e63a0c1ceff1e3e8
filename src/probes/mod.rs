//! Probe contract and the built-in probe catalog.
//!
//! A probe is one atomic check against the target. Every probe, built-in or
//! plugged in, returns a [`ProbeResult`]; an insecure finding is a normal
//! `success: false` result, never an error.

pub mod builder;
pub mod context;
pub mod control_plane;
pub mod catalog;
pub mod https;
pub mod attack;
pub mod rate_limit;
pub mod access;
pub mod monitoring;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use builder::{FnProbe, ProbeBuilder, ProbeCheck};
pub use context::ProbeContext;
pub use control_plane::{ControlPlane, HttpControlPlane, ReadOnlyControlPlane};

/// The security control a probe provides evidence for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityControl {
    HttpsEnforcement,
    Certificate,
    SecurityHeaders,
    Waf,
    InjectionDefense,
    RateLimiting,
    AccessRestriction,
    Monitoring,
    Other,
}

/// Structured evidence attached to a probe result, one variant per kind of check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeDetail {
    HttpsRedirect {
        status: Option<u16>,
        location: Option<String>,
        enforced: bool,
    },
    Certificate {
        valid: bool,
        reason: Option<String>,
    },
    SecurityHeaders {
        present: Vec<String>,
        missing: Vec<String>,
    },
    Waf {
        active: bool,
        status: Option<u16>,
    },
    AttackSimulation {
        attack: String,
        attempted: u32,
        blocked: u32,
        exploited: Vec<String>,
    },
    RateLimit {
        requests_sent: u32,
        throttled_after: Option<u32>,
        retry_after: Option<String>,
        interrupted: bool,
    },
    RateLimitHeaders {
        present: Vec<String>,
        missing: Vec<String>,
    },
    AccessControl {
        checked: u32,
        exposed: Vec<String>,
    },
    Monitoring {
        check: String,
        configured: bool,
        resources: u32,
    },
    /// The probe could not produce evidence (error, panic or timeout).
    Error,
    Custom {
        data: serde_json::Value,
    },
}

/// Outcome of one probe invocation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub name: String,
    pub control: SecurityControl,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_attacks: Option<u32>,
    pub detail: ProbeDetail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl ProbeResult {
    /// Failed result for a probe that raised an error instead of reporting.
    pub fn errored(name: &str, control: SecurityControl, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            control,
            success: false,
            blocked_attacks: None,
            detail: ProbeDetail::Error,
            error_message: Some(message.into()),
            duration_ms,
        }
    }

    pub fn timed_out(name: &str, control: SecurityControl, duration_ms: u64) -> Self {
        Self::errored(name, control, "timeout", duration_ms)
    }

    /// True when the failure came from the probe itself rather than the target.
    pub fn is_execution_error(&self) -> bool {
        self.error_message.is_some()
    }
}

/// One atomic check. Implementations enforce their own timeout and report
/// insecure findings as `success: false`.
#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;

    fn control(&self) -> SecurityControl;

    fn timeout(&self) -> Duration;

    async fn execute(&self, ctx: &ProbeContext) -> ProbeResult;
}
