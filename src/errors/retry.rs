use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::types::ProdGuardError;
use crate::monitor::AbortSignal;

/// Retry settings for category-level infrastructure errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 5_000,
        }
    }
}

/// Result of a retried operation together with the attempt history.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, ProdGuardError>,
    /// Total attempts made, including the first one.
    pub attempts: u32,
    /// Display strings of every error that caused a retry or the final failure.
    pub attempt_errors: Vec<String>,
}

impl<T> RetryOutcome<T> {
    pub fn retried(&self) -> bool {
        self.attempts > 1
    }
}

/// Execute an async operation with fixed-delay retry.
///
/// Only errors classified as retryable are retried, at most
/// `policy.max_retries` times after the first attempt. No new attempt starts
/// once the abort signal is set.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    abort: &AbortSignal,
    mut factory: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProdGuardError>>,
{
    let max_attempts = policy.max_retries + 1;
    let mut attempt_errors = Vec::new();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match factory(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                    attempt_errors,
                };
            }
            Err(e) => {
                let classification = e.classify();
                attempt_errors.push(format!("attempt {}: {}", attempt, e));

                if !classification.retryable {
                    warn!(
                        operation = operation_name,
                        error_type = classification.error_type,
                        error = %e,
                        "Non-retryable error, failing immediately"
                    );
                    return RetryOutcome { result: Err(e), attempts: attempt, attempt_errors };
                }
                if attempt >= max_attempts {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max = max_attempts,
                        error = %e,
                        "Max retries exhausted"
                    );
                    return RetryOutcome { result: Err(e), attempts: attempt, attempt_errors };
                }
                if abort.is_aborted() {
                    warn!(operation = operation_name, attempt, "Abort requested, not retrying");
                    return RetryOutcome { result: Err(e), attempts: attempt, attempt_errors };
                }

                warn!(
                    operation = operation_name,
                    attempt,
                    max = max_attempts,
                    error_type = classification.error_type,
                    delay_ms = policy.retry_delay_ms,
                    error = %e,
                    "Retrying after error"
                );
                tokio::time::sleep(policy.delay()).await;
            }
        }
    }
}
