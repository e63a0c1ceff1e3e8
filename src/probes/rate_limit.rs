use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use tracing::{debug, info};

use super::{FnProbe, ProbeBuilder, ProbeCheck, ProbeDetail, SecurityControl};

const RATE_LIMIT_HEADERS: &[&str] = &[
    "ratelimit-limit",
    "ratelimit-remaining",
    "x-ratelimit-limit",
    "x-ratelimit-remaining",
    "retry-after",
];

/// Sends up to the context's request budget one request at a time and passes
/// on the first 429.
///
/// The abort flag is checked before every request; an interrupted flood that
/// was never throttled is reported as an error rather than a finding.
pub fn rate_limit_flood(timeout: Duration) -> FnProbe {
    ProbeBuilder::new("rate-limit-flood")
        .control(SecurityControl::RateLimiting)
        .timeout(timeout)
        .run(|ctx| async move {
            let budget = ctx.rate_limit_budget;
            let mut sent = 0u32;
            let mut throttled_after = None;
            let mut retry_after = None;
            let mut interrupted = false;

            while sent < budget {
                if ctx.abort.is_aborted() {
                    interrupted = true;
                    break;
                }
                let response = ctx.get(ctx.target.clone()).await
                    .with_context(|| format!("flood request {}", sent + 1))?;
                sent += 1;

                if response.status() == StatusCode::TOO_MANY_REQUESTS {
                    throttled_after = Some(sent);
                    retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    break;
                }
            }

            if interrupted && throttled_after.is_none() {
                debug!(sent, "Rate-limit flood interrupted before throttling was observed");
                anyhow::bail!("interrupted by emergency stop after {} requests", sent);
            }

            info!(sent, throttled_after = ?throttled_after, "Rate-limit flood finished");
            Ok(ProbeCheck::new(throttled_after.is_some(), ProbeDetail::RateLimit {
                requests_sent: sent,
                throttled_after,
                retry_after,
                interrupted,
            }))
        })
}

/// A single request must advertise rate-limit policy headers.
pub fn rate_limit_headers(timeout: Duration) -> FnProbe {
    ProbeBuilder::new("rate-limit-headers")
        .control(SecurityControl::RateLimiting)
        .timeout(timeout)
        .run(|ctx| async move {
            let response = ctx.get(ctx.target.clone()).await.context("GET target")?;
            let present: Vec<String> = RATE_LIMIT_HEADERS
                .iter()
                .filter(|name| response.headers().contains_key(**name))
                .map(|name| name.to_string())
                .collect();
            let missing: Vec<String> = RATE_LIMIT_HEADERS
                .iter()
                .filter(|name| !present.iter().any(|p| p.as_str() == **name))
                .map(|name| name.to_string())
                .collect();

            Ok(ProbeCheck::new(!present.is_empty(), ProbeDetail::RateLimitHeaders { present, missing }))
        })
}
