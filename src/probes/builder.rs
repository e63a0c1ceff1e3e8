use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use super::{Probe, ProbeContext, ProbeDetail, ProbeResult, SecurityControl};
use crate::utils::panic::panic_message;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// What a probe body reports when it completes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeCheck {
    pub passed: bool,
    pub blocked_attacks: Option<u32>,
    pub detail: ProbeDetail,
}

impl ProbeCheck {
    pub fn new(passed: bool, detail: ProbeDetail) -> Self {
        Self { passed, blocked_attacks: None, detail }
    }

    pub fn with_blocked_attacks(mut self, blocked: u32) -> Self {
        self.blocked_attacks = Some(blocked);
        self
    }
}

type CheckFn = Arc<dyn Fn(ProbeContext) -> BoxFuture<'static, anyhow::Result<ProbeCheck>> + Send + Sync>;

/// Builds a [`Probe`] from a name and an async body.
///
/// The resulting probe owns the timing, timeout and error conversion, so a
/// body only has to describe the check itself.
pub struct ProbeBuilder {
    name: String,
    control: SecurityControl,
    timeout: Duration,
}

impl ProbeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            control: SecurityControl::Other,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn control(mut self, control: SecurityControl) -> Self {
        self.control = control;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn run<F, Fut>(self, body: F) -> FnProbe
    where
        F: Fn(ProbeContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ProbeCheck>> + Send + 'static,
    {
        FnProbe {
            name: self.name,
            control: self.control,
            timeout: self.timeout,
            check: Arc::new(move |ctx| body(ctx).boxed()),
        }
    }
}

pub struct FnProbe {
    name: String,
    control: SecurityControl,
    timeout: Duration,
    check: CheckFn,
}

#[async_trait]
impl Probe for FnProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn control(&self) -> SecurityControl {
        self.control
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(&self, ctx: &ProbeContext) -> ProbeResult {
        let start = Instant::now();
        let body = AssertUnwindSafe((self.check)(ctx.clone())).catch_unwind();
        let outcome = tokio::time::timeout(self.timeout, body).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Err(_) => ProbeResult::timed_out(&self.name, self.control, duration_ms),
            Ok(Err(panic)) => ProbeResult::errored(
                &self.name,
                self.control,
                format!("probe panicked: {}", panic_message(panic.as_ref())),
                duration_ms,
            ),
            Ok(Ok(Err(e))) => {
                debug!(probe = %self.name, error = %e, "Probe body returned an error");
                ProbeResult::errored(&self.name, self.control, format!("{:#}", e), duration_ms)
            }
            Ok(Ok(Ok(check))) => ProbeResult {
                name: self.name.clone(),
                control: self.control,
                success: check.passed,
                blocked_attacks: check.blocked_attacks,
                detail: check.detail,
                error_message: None,
                duration_ms,
            },
        }
    }
}
