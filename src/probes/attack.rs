use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context;
use regex::Regex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FnProbe, ProbeBuilder, ProbeCheck, ProbeDetail, SecurityControl};

const MAX_BODY_BYTES: usize = 64 * 1024;

static SQL_ERROR_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(you have an error in your sql syntax|mysql_fetch|ORA-\d{5}|postgresql.{0,40}error|sqlite3?::|unclosed quotation mark|syntax error at or near)")
        .expect("valid SQL signature regex")
});

static PASSWD_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"root:[x*]?:0:0:").expect("valid passwd signature regex")
});

static COMMAND_OUTPUT_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"uid=\d+\([a-z_][a-z0-9_-]*\)").expect("valid command output regex")
});

/// Status codes that count as the request being rejected before reaching the app.
pub fn is_blocking_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 400 | 403 | 406 | 429 | 501)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttackClass {
    SqlInjection,
    Xss,
    PathTraversal,
    CommandInjection,
}

impl AttackClass {
    pub const ALL: [AttackClass; 4] = [
        AttackClass::SqlInjection,
        AttackClass::Xss,
        AttackClass::PathTraversal,
        AttackClass::CommandInjection,
    ];

    pub fn probe_name(&self) -> &'static str {
        match self {
            Self::SqlInjection => "sql-injection",
            Self::Xss => "xss",
            Self::PathTraversal => "path-traversal",
            Self::CommandInjection => "command-injection",
        }
    }

    /// Query parameter the payloads are sent in.
    fn parameter(&self) -> &'static str {
        match self {
            Self::SqlInjection => "id",
            Self::Xss => "q",
            Self::PathTraversal => "file",
            Self::CommandInjection => "host",
        }
    }

    pub fn payloads(&self) -> &'static [&'static str] {
        match self {
            Self::SqlInjection => &[
                "1' OR '1'='1",
                "1; DROP TABLE users--",
                "' UNION SELECT NULL,NULL--",
                "1' AND SLEEP(0)--",
            ],
            Self::Xss => &[
                "<script>alert('xss')</script>",
                "\"><img src=x onerror=alert(1)>",
                "<svg/onload=alert(1)>",
            ],
            Self::PathTraversal => &[
                "../../../../etc/passwd",
                "..%2f..%2f..%2f..%2fetc%2fpasswd",
                "....//....//....//etc/passwd",
            ],
            Self::CommandInjection => &[
                "127.0.0.1; id",
                "127.0.0.1 | id",
                "$(id)",
            ],
        }
    }

    /// Whether `body` shows the payload was executed or reflected unescaped.
    pub fn exploited(&self, payload: &str, body: &str) -> bool {
        match self {
            Self::SqlInjection => SQL_ERROR_SIGNATURE.is_match(body),
            Self::Xss => body.contains(payload),
            Self::PathTraversal => PASSWD_SIGNATURE.is_match(body),
            Self::CommandInjection => COMMAND_OUTPUT_SIGNATURE.is_match(body),
        }
    }
}

/// Sends each payload of `class` as a GET parameter and checks the response.
///
/// Only GET requests are issued, so the probe is safe in read-only mode.
pub fn injection_simulation(class: AttackClass, timeout: Duration) -> FnProbe {
    ProbeBuilder::new(class.probe_name())
        .control(SecurityControl::InjectionDefense)
        .timeout(timeout)
        .run(move |ctx| async move {
            let mut attempted = 0u32;
            let mut blocked = 0u32;
            let mut exploited = Vec::new();

            for payload in class.payloads() {
                if ctx.abort.is_aborted() {
                    debug!(probe = class.probe_name(), attempted, "Abort set, stopping payload list");
                    anyhow::bail!(
                        "interrupted by emergency stop after {} of {} payloads",
                        attempted,
                        class.payloads().len()
                    );
                }

                let mut url = ctx.target.clone();
                url.query_pairs_mut().append_pair(class.parameter(), payload);

                let response = ctx.get(url).await
                    .with_context(|| format!("sending {} payload", class.probe_name()))?;
                attempted += 1;

                if is_blocking_status(response.status()) {
                    blocked += 1;
                    continue;
                }

                let bytes = response.bytes().await.context("reading response body")?;
                let body = String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_BODY_BYTES)]);
                if class.exploited(payload, &body) {
                    exploited.push(payload.to_string());
                }
            }

            Ok(ProbeCheck::new(exploited.is_empty(), ProbeDetail::AttackSimulation {
                attack: class.probe_name().to_string(),
                attempted,
                blocked,
                exploited,
            })
            .with_blocked_attacks(blocked))
        })
}
