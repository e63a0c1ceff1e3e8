use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::cleanup::{Cleanup, CleanupRegistry};
use super::state::{run_succeeded, RunOutcome, RunState, RunStatus};
use crate::config::RunConfig;
use crate::errors::{with_retry, ProdGuardError};
use crate::models::CategoryResult;
use crate::monitor::{AbortSignal, ControlPlaneSampler, EmergencyStopMonitor, RequestLedger, StopHandle, UsageSampler};
use crate::probes::catalog::CategoryKind;
use crate::probes::{ControlPlane, HttpControlPlane, ProbeContext, ReadOnlyControlPlane};
use crate::runner::{CategoryRunner, CategorySpec};
use crate::scoring::aggregate;
use crate::utils::panic::panic_message;

/// Drives one run: categories in execution order, watchdog, retries, cleanup.
pub struct TestOrchestrator {
    config: RunConfig,
    run_id: String,
    specs: Vec<CategorySpec>,
    ctx: ProbeContext,
    runner: CategoryRunner,
    monitor: Arc<EmergencyStopMonitor>,
    cleanup: CleanupRegistry,
    state: Arc<RwLock<RunState>>,
    results: Vec<CategoryResult>,
    errors: Vec<String>,
}

impl TestOrchestrator {
    /// Wire a run from explicit parts.
    ///
    /// `specs` must contain one spec per name in the execution order; extra
    /// specs are ignored. The context's abort signal is replaced with the
    /// monitor's.
    pub fn new(
        config: RunConfig,
        specs: Vec<CategorySpec>,
        ctx: ProbeContext,
        sampler: Arc<dyn UsageSampler>,
    ) -> Result<Self, ProdGuardError> {
        if config.dry_run {
            return Err(ProdGuardError::Config("Dry-run configuration cannot be executed".into()));
        }

        let specs = order_specs(&config, specs)?;

        let monitor = Arc::new(
            EmergencyStopMonitor::new(config.emergency_stop.clone(), sampler)
                .with_poll_interval(config.poll_interval),
        );

        let mut ctx = ctx
            .with_read_only(config.read_only)
            .with_rate_limit_budget(config.rate_limit_budget);
        ctx.abort = monitor.signal();
        if config.read_only {
            if let Some(plane) = ctx.control_plane.take() {
                ctx.control_plane = Some(Arc::new(ReadOnlyControlPlane::new(plane)) as Arc<dyn ControlPlane>);
            }
        }

        let mut cleanup = CleanupRegistry::new();
        cleanup.register(monitor.clone());

        Ok(Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            runner: CategoryRunner::new(config.concurrency),
            config,
            specs,
            ctx,
            monitor,
            cleanup,
            state: Arc::new(RwLock::new(RunState::new())),
            results: Vec::new(),
            errors: Vec::new(),
        })
    }

    /// A run over the built-in probe catalog with an HTTP client, request
    /// ledger and, when configured, the HTTP control plane.
    pub fn builtin(config: RunConfig) -> Result<Self, ProdGuardError> {
        let specs = config
            .execution_order
            .iter()
            .map(|name| name.parse::<CategoryKind>().map(|kind| CategorySpec::builtin(kind, &config.probe_timeouts)))
            .collect::<Result<Vec<_>, _>>()?;

        let client = ProbeContext::build_client(config.probe_timeouts.probe)?;
        let ledger = Arc::new(RequestLedger::new(config.request_capacity, config.cost_per_request_usd));

        let control_plane: Option<Arc<dyn ControlPlane>> = config.control_plane.as_ref().map(|cp| {
            Arc::new(HttpControlPlane::new(client.clone(), cp.endpoint.clone(), cp.token.clone())) as Arc<dyn ControlPlane>
        });

        let sampler: Arc<dyn UsageSampler> = match &control_plane {
            Some(plane) => {
                let read_only: Arc<dyn ControlPlane> = Arc::new(ReadOnlyControlPlane::new(plane.clone()));
                Arc::new(ControlPlaneSampler::new(read_only))
            }
            None => ledger.clone() as Arc<dyn UsageSampler>,
        };

        let ctx = ProbeContext::new(config.target.clone(), client, AbortSignal::never())
            .with_ledger(ledger)
            .with_control_plane(control_plane);

        Self::new(config, specs, ctx, sampler)
    }

    /// Register another owned resource to release when the run ends.
    pub fn with_resource(mut self, resource: Arc<dyn Cleanup>) -> Self {
        self.cleanup.register(resource);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Asks the watchdog to trip; the run then ends like any emergency stop.
    pub fn stop_handle(&self) -> StopHandle {
        self.monitor.stop_handle()
    }

    pub fn state(&self) -> Arc<RwLock<RunState>> {
        self.state.clone()
    }

    pub fn monitor(&self) -> Arc<EmergencyStopMonitor> {
        self.monitor.clone()
    }

    /// Execute the run. Always returns an outcome; owned resources are
    /// released exactly once before it does.
    pub async fn run(mut self) -> RunOutcome {
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(
            run_id = %self.run_id,
            environment = %self.config.environment,
            target = %self.config.target,
            categories = self.specs.len(),
            read_only = self.config.read_only,
            "Starting security validation run"
        );

        self.monitor.start().await;

        let status = match AssertUnwindSafe(self.execute()).catch_unwind().await {
            Ok(status) => status,
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                error!(panic = %msg, "Unhandled error in orchestrator, producing failure summary");
                self.errors.push(format!("unhandled error: {}", msg));
                RunStatus::Failed
            }
        };

        let cleanup_errors = self.cleanup.release_all().await;
        self.errors.extend(cleanup_errors);
        self.update_status(status).await;

        let trip_reason = self.monitor.trip_reason().await;
        if let Some(reason) = &trip_reason {
            self.errors.push(format!("emergency stop: {}", reason));
        }

        let summary = aggregate(&self.results);
        let success = run_succeeded(status, &self.results, &summary, self.config.pass_threshold);
        let duration_ms = clock.elapsed().as_millis() as u64;

        info!(
            run_id = %self.run_id,
            status = status.as_str(),
            success,
            score = summary.overall_security_score,
            passed = summary.passed_tests,
            failed = summary.failed_tests,
            skipped = summary.skipped_tests,
            duration_ms,
            "Run finished"
        );

        RunOutcome {
            run_id: self.run_id,
            environment: self.config.environment,
            target: self.config.target.to_string(),
            started_at,
            status,
            success,
            results: self.results,
            summary,
            errors: self.errors,
            trip_reason,
            duration_ms,
        }
    }

    async fn execute(&mut self) -> RunStatus {
        for index in 0..self.specs.len() {
            if self.ctx.abort.is_aborted() {
                let remaining = &self.specs[index..];
                warn!(
                    skipped = remaining.len(),
                    next = %remaining[0].name,
                    "Emergency stop set, skipping remaining categories"
                );
                self.results.extend(
                    remaining
                        .iter()
                        .map(|spec| CategoryResult::skipped(&spec.name, spec.tracked_vuln_classes)),
                );
                return RunStatus::Aborted;
            }

            self.update_status(RunStatus::Running { category_index: index }).await;
            {
                let mut state = self.state.write().await;
                state.current_category = Some(self.specs[index].name.clone());
            }

            let (result, notes) = self.run_category(&self.specs[index]).await;
            self.errors.extend(notes);

            let mut state = self.state.write().await;
            state.current_category = None;
            state.completed_categories.push(result.category_name.clone());
            drop(state);

            self.results.push(result);
        }

        if self.ctx.abort.is_aborted() {
            RunStatus::Aborted
        } else {
            RunStatus::Completed
        }
    }

    /// Runs one category under retry and its implicit timeout.
    /// Returns the result plus run-level notes about retries.
    async fn run_category(&self, spec: &CategorySpec) -> (CategoryResult, Vec<String>) {
        let start = Instant::now();
        let limit = spec.implicit_timeout();
        let runner = &self.runner;
        let ctx = &self.ctx;

        let outcome = with_retry(&spec.name, &self.config.retry, &self.ctx.abort, |attempt| async move {
            if attempt > 1 {
                info!(category = %spec.name, attempt, "Retrying category");
            }
            match tokio::time::timeout(limit, AssertUnwindSafe(runner.run(spec, ctx)).catch_unwind()).await {
                Ok(Ok(result)) => result,
                Ok(Err(panic)) => Err(ProdGuardError::CategoryInfrastructure(format!(
                    "category panicked: {}",
                    panic_message(panic.as_ref())
                ))),
                Err(_) => Err(ProdGuardError::Timeout(format!(
                    "category '{}' exceeded {}ms",
                    spec.name,
                    limit.as_millis()
                ))),
            }
        })
        .await;

        let notes: Vec<String> = outcome
            .attempt_errors
            .iter()
            .map(|e| format!("{}: {}", spec.name, e))
            .collect();

        let retried = outcome.retried();
        match outcome.result {
            Ok(mut result) => {
                result.attempts = outcome.attempts;
                if retried {
                    info!(category = %spec.name, attempts = outcome.attempts, "Category recovered after retry");
                }
                (result, notes)
            }
            Err(e) => {
                error!(
                    category = %spec.name,
                    attempts = outcome.attempts,
                    error = %e,
                    "Category could not run, recording as errored"
                );
                let result = CategoryResult::errored(
                    &spec.name,
                    spec.tracked_vuln_classes,
                    outcome.attempt_errors,
                    outcome.attempts,
                    start.elapsed().as_millis() as u64,
                );
                (result, notes)
            }
        }
    }

    async fn update_status(&self, status: RunStatus) {
        self.state.write().await.status = status;
    }
}

/// Arrange specs in execution order and apply configured critical overrides.
fn order_specs(config: &RunConfig, specs: Vec<CategorySpec>) -> Result<Vec<CategorySpec>, ProdGuardError> {
    let mut pool: Vec<Option<CategorySpec>> = specs.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(config.execution_order.len());

    for name in &config.execution_order {
        let mut spec = pool
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|s| &s.name == name))
            .and_then(Option::take)
            .ok_or_else(|| ProdGuardError::Config(format!("No probes registered for category '{}'", name)))?;

        if let Some(critical) = config.critical_override(name) {
            let known: BTreeSet<String> = spec.probe_names().into_iter().collect();
            for probe in critical.iter().filter(|p| !known.contains(*p)) {
                warn!(category = %name, probe = %probe, "Critical probe override names an unknown probe");
            }
            spec.critical_probes = critical.iter().cloned().collect();
        }
        ordered.push(spec);
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, RunConfigBuilder};
    use crate::errors::RetryPolicy;
    use crate::probes::{ProbeBuilder, ProbeCheck, ProbeDetail};
    use reqwest::Url;

    fn config(order: &[&str]) -> RunConfig {
        let mut builder = RunConfigBuilder::for_environment(Environment::Development)
            .target("https://shop.example.com")
            .retry(RetryPolicy { max_retries: 0, retry_delay_ms: 1 });
        for name in order {
            builder = builder.known_category(*name);
        }
        builder.execution_order(order.iter().copied()).build().unwrap()
    }

    fn passing_spec(name: &str) -> CategorySpec {
        CategorySpec::new(name, 1)
            .with_probe(Arc::new(ProbeBuilder::new(format!("{}-check", name)).run(|_ctx| async {
                Ok(ProbeCheck::new(true, ProbeDetail::Error))
            })))
    }

    fn ctx() -> ProbeContext {
        let client = ProbeContext::build_client(std::time::Duration::from_secs(1)).unwrap();
        ProbeContext::new(Url::parse("https://shop.example.com").unwrap(), client, crate::monitor::AbortSignal::never())
    }

    #[test]
    fn test_missing_spec_is_config_error() {
        let result = TestOrchestrator::new(
            config(&["alpha", "beta"]),
            vec![passing_spec("alpha")],
            ctx(),
            Arc::new(RequestLedger::default()),
        );
        assert!(matches!(result, Err(ProdGuardError::Config(_))));
    }

    #[test]
    fn test_dry_run_refuses_to_execute() {
        let mut cfg = config(&["alpha"]);
        cfg.dry_run = true;
        let result = TestOrchestrator::new(cfg, vec![passing_spec("alpha")], ctx(), Arc::new(RequestLedger::default()));
        assert!(result.is_err());
    }

    #[test]
    fn test_specs_follow_execution_order() {
        let ordered = order_specs(
            &config(&["beta", "alpha"]),
            vec![passing_spec("alpha"), passing_spec("beta"), passing_spec("gamma")],
        )
        .unwrap();
        let names: Vec<_> = ordered.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["beta", "alpha"]);
    }

    #[tokio::test]
    async fn test_clean_run_completes() {
        let orchestrator = TestOrchestrator::new(
            config(&["alpha", "beta"]),
            vec![passing_spec("alpha"), passing_spec("beta")],
            ctx(),
            Arc::new(RequestLedger::default()),
        )
        .unwrap();
        let state = orchestrator.state();
        let outcome = orchestrator.run().await;

        assert_eq!(outcome.status, RunStatus::Completed);
        assert!(outcome.success);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.summary.passed_tests, 2);
        assert_eq!(outcome.summary.overall_security_score, 1.0);
        assert!(outcome.errors.is_empty());
        assert_eq!(state.read().await.completed_categories, vec!["alpha", "beta"]);
    }
}
