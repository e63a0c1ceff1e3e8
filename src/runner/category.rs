use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::spec::CategorySpec;
use super::{ConcurrencyMode, ConcurrencyPolicy};
use crate::errors::ProdGuardError;
use crate::models::{CategoryResult, CategoryStatus};
use crate::probes::{Probe, ProbeContext, ProbeResult};
use crate::scoring::derive_metrics;
use crate::utils::panic::panic_message;

/// Extra time a probe gets to report its own timeout before the runner cuts it off.
pub(super) const TIMEOUT_GRACE: Duration = Duration::from_millis(250);

/// How long the runner lets one probe run before cutting it off.
pub(super) fn probe_limit(probe: &dyn Probe) -> Duration {
    probe.timeout() + TIMEOUT_GRACE
}

/// Executes the probes of one category and assembles its result.
#[derive(Debug, Clone)]
pub struct CategoryRunner {
    concurrency: ConcurrencyPolicy,
}

impl CategoryRunner {
    pub fn new(concurrency: ConcurrencyPolicy) -> Self {
        Self { concurrency }
    }

    pub fn concurrency(&self) -> ConcurrencyPolicy {
        self.concurrency
    }

    /// Runs `spec` to completion.
    ///
    /// Probe failures of any kind end up inside the returned result; only a
    /// failing category setup is returned as an error.
    pub async fn run(&self, spec: &CategorySpec, ctx: &ProbeContext) -> Result<CategoryResult, ProdGuardError> {
        let start = Instant::now();

        if let Some(setup) = &spec.setup {
            debug!(category = %spec.name, "Running category setup");
            setup.prepare(&spec.name, ctx).await?;
        }

        info!(
            category = %spec.name,
            probes = spec.probes.len(),
            mode = ?self.concurrency.mode,
            limit = self.concurrency.limit(),
            "Running category"
        );

        let probe_results = match self.concurrency.mode {
            ConcurrencyMode::Sequential => self.run_sequential(spec, ctx).await,
            ConcurrencyMode::BoundedParallel => self.run_bounded(spec, ctx).await,
        };

        let result = assemble(spec, probe_results, start.elapsed().as_millis() as u64);
        info!(
            category = %spec.name,
            status = ?result.status,
            vulnerabilities = result.metrics.vulnerabilities_found,
            duration_ms = result.duration_ms,
            "Category finished"
        );
        Ok(result)
    }

    async fn run_sequential(&self, spec: &CategorySpec, ctx: &ProbeContext) -> Vec<ProbeResult> {
        let mut results = Vec::with_capacity(spec.probes.len());
        for probe in &spec.probes {
            results.push(run_probe(probe.as_ref(), ctx).await);
        }
        results
    }

    /// At most `limit` probes hold a permit at once; results are put back in
    /// declaration order once all have finished.
    async fn run_bounded(&self, spec: &CategorySpec, ctx: &ProbeContext) -> Vec<ProbeResult> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency.limit()));

        let tasks = spec.probes.iter().map(|probe| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return ProbeResult::errored(probe.name(), probe.control(), "probe scheduler closed", 0);
                    }
                };
                run_probe(probe.as_ref(), ctx).await
            }
        });

        join_all(tasks).await
    }
}

/// Invokes one probe under its timeout, turning panics and overruns into failed results.
async fn run_probe(probe: &dyn Probe, ctx: &ProbeContext) -> ProbeResult {
    let start = Instant::now();
    let limit = probe_limit(probe);
    let outcome = tokio::time::timeout(limit, AssertUnwindSafe(probe.execute(ctx)).catch_unwind()).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(result)) => {
            if let Some(err) = &result.error_message {
                warn!(probe = %result.name, error = %err, "Probe execution error");
            } else {
                debug!(probe = %result.name, success = result.success, "Probe finished");
            }
            result
        }
        Ok(Err(panic)) => {
            warn!(probe = probe.name(), "Probe panicked");
            ProbeResult::errored(
                probe.name(),
                probe.control(),
                format!("probe panicked: {}", panic_message(panic.as_ref())),
                elapsed_ms,
            )
        }
        Err(_) => {
            warn!(probe = probe.name(), timeout_ms = limit.as_millis() as u64, "Probe timed out");
            ProbeResult::timed_out(probe.name(), probe.control(), elapsed_ms)
        }
    }
}

fn assemble(spec: &CategorySpec, probe_results: Vec<ProbeResult>, duration_ms: u64) -> CategoryResult {
    let errors: Vec<String> = probe_results
        .iter()
        .filter_map(|r| r.error_message.as_ref().map(|msg| format!("{}: {}", r.name, msg)))
        .collect();

    let success = probe_results
        .iter()
        .filter(|r| spec.is_critical(&r.name))
        .all(|r| r.success);

    let metrics = derive_metrics(&probe_results, spec.tracked_vuln_classes);

    CategoryResult {
        category_name: spec.name.clone(),
        status: if success { CategoryStatus::Passed } else { CategoryStatus::Failed },
        success,
        probe_results,
        metrics,
        tracked_vuln_classes: spec.tracked_vuln_classes,
        duration_ms,
        errors,
        attempts: 1,
    }
}
