use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use tracing::warn;

use super::credentials::resolve_credential;
use super::presets::Environment;
use super::types::ProdGuardConfig;
use crate::errors::{ProdGuardError, RetryPolicy};
use crate::monitor::EmergencyStopConfig;
use crate::probes::catalog::{CategoryKind, ProbeTimeouts};
use crate::runner::{ConcurrencyMode, ConcurrencyPolicy};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const DEFAULT_OUTPUT_DIR: &str = "./prodguard-reports";

/// Where control-plane calls go.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPlaneSettings {
    pub endpoint: Url,
    pub token: Option<String>,
}

/// Immutable settings for one run, built once at process start.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub environment: Environment,
    pub target: Url,
    pub execution_order: Vec<String>,
    pub concurrency: ConcurrencyPolicy,
    pub retry: RetryPolicy,
    pub read_only: bool,
    pub dry_run: bool,
    pub pass_threshold: f64,
    pub emergency_stop: EmergencyStopConfig,
    pub poll_interval: Duration,
    pub probe_timeouts: ProbeTimeouts,
    pub rate_limit_budget: u32,
    pub request_capacity: u64,
    pub cost_per_request_usd: f64,
    /// Per-category replacement of the default critical probe set.
    pub critical_overrides: BTreeMap<String, Vec<String>>,
    pub control_plane: Option<ControlPlaneSettings>,
    pub output_dir: PathBuf,
    pub markdown: bool,
}

impl RunConfig {
    pub fn builder(environment: Environment) -> RunConfigBuilder {
        RunConfigBuilder::for_environment(environment)
    }

    /// Whether `category` was explicitly given its own critical probes.
    pub fn critical_override(&self, category: &str) -> Option<&[String]> {
        self.critical_overrides.get(category).map(Vec::as_slice)
    }
}

/// Layers preset, file and explicit overrides, then validates once in `build()`.
#[derive(Debug, Clone)]
pub struct RunConfigBuilder {
    environment: Environment,
    target: Option<String>,
    execution_order: Option<Vec<String>>,
    concurrency: ConcurrencyPolicy,
    retry: RetryPolicy,
    read_only: bool,
    dry_run: bool,
    pass_threshold: f64,
    emergency_stop: EmergencyStopConfig,
    poll_interval: Duration,
    probe_timeouts: ProbeTimeouts,
    rate_limit_budget: u32,
    request_capacity: u64,
    cost_per_request_usd: f64,
    critical_overrides: BTreeMap<String, Vec<String>>,
    control_plane: Option<(String, Option<String>)>,
    output_dir: PathBuf,
    markdown: bool,
    extra_categories: BTreeSet<String>,
}

impl RunConfigBuilder {
    pub fn for_environment(environment: Environment) -> Self {
        let preset = environment.preset();
        Self {
            environment,
            target: None,
            execution_order: None,
            concurrency: preset.concurrency,
            retry: preset.retry,
            read_only: preset.read_only,
            dry_run: false,
            pass_threshold: preset.pass_threshold,
            emergency_stop: preset.emergency_stop,
            poll_interval: DEFAULT_POLL_INTERVAL,
            probe_timeouts: ProbeTimeouts::default(),
            rate_limit_budget: preset.rate_limit_budget,
            request_capacity: 10,
            cost_per_request_usd: 0.0001,
            critical_overrides: BTreeMap::new(),
            control_plane: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            markdown: false,
            extra_categories: BTreeSet::new(),
        }
    }

    /// Overlay every value the file sets.
    pub fn apply_file(mut self, file: &ProdGuardConfig) -> Self {
        if let Some(target) = &file.target {
            self.target = Some(target.clone());
        }

        if let Some(execution) = &file.execution {
            if let Some(order) = &execution.order {
                self.execution_order = Some(order.clone());
            }
            if let Some(concurrency) = &execution.concurrency {
                let mode = concurrency.mode.unwrap_or(self.concurrency.mode);
                let max = concurrency.max_concurrent.unwrap_or(self.concurrency.max_concurrent);
                self.concurrency = match mode {
                    ConcurrencyMode::Sequential => ConcurrencyPolicy::sequential(),
                    ConcurrencyMode::BoundedParallel => ConcurrencyPolicy::bounded(max),
                };
            }
            if let Some(retry) = &execution.retry {
                self.retry.max_retries = retry.max_retries.unwrap_or(self.retry.max_retries);
                self.retry.retry_delay_ms = retry.retry_delay_ms.unwrap_or(self.retry.retry_delay_ms);
            }
            self.read_only = execution.read_only.unwrap_or(self.read_only);
            self.dry_run = execution.dry_run.unwrap_or(self.dry_run);
            self.pass_threshold = execution.pass_threshold.unwrap_or(self.pass_threshold);
        }

        if let Some(stop) = &file.emergency_stop {
            let es = &mut self.emergency_stop;
            es.max_test_duration_ms = stop.max_test_duration_ms.unwrap_or(es.max_test_duration_ms);
            es.resource_threshold = stop.resource_threshold.unwrap_or(es.resource_threshold);
            es.cost_threshold_usd = stop.cost_threshold_usd.unwrap_or(es.cost_threshold_usd);
            es.auto_stop_enabled = stop.auto_stop_enabled.unwrap_or(es.auto_stop_enabled);
            if let Some(ms) = stop.poll_interval_ms {
                self.poll_interval = Duration::from_millis(ms);
            }
        }

        if let Some(probes) = &file.probes {
            if let Some(ms) = probes.timeout_ms {
                self.probe_timeouts.probe = Duration::from_millis(ms);
            }
            if let Some(ms) = probes.flood_timeout_ms {
                self.probe_timeouts.flood = Duration::from_millis(ms);
            }
            self.rate_limit_budget = probes.rate_limit_requests.unwrap_or(self.rate_limit_budget);
            self.cost_per_request_usd = probes.cost_per_request_usd.unwrap_or(self.cost_per_request_usd);
            self.request_capacity = probes.request_capacity.unwrap_or(self.request_capacity);
        }

        if let Some(categories) = &file.categories {
            for (name, category) in categories {
                if let Some(critical) = &category.critical_probes {
                    self.critical_overrides.insert(name.clone(), critical.clone());
                }
            }
        }

        if let Some(cp) = &file.control_plane {
            self.control_plane = Some((cp.endpoint.clone(), cp.token.clone()));
        }

        if let Some(output) = &file.output {
            if let Some(dir) = &output.directory {
                self.output_dir = PathBuf::from(dir);
            }
            self.markdown = output.markdown.unwrap_or(self.markdown);
        }

        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn execution_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.execution_order = Some(order.into_iter().map(Into::into).collect());
        self
    }

    pub fn concurrency(mut self, concurrency: ConcurrencyPolicy) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = threshold;
        self
    }

    pub fn emergency_stop(mut self, config: EmergencyStopConfig) -> Self {
        self.emergency_stop = config;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn probe_timeouts(mut self, timeouts: ProbeTimeouts) -> Self {
        self.probe_timeouts = timeouts;
        self
    }

    pub fn rate_limit_budget(mut self, budget: u32) -> Self {
        self.rate_limit_budget = budget;
        self
    }

    pub fn critical_probes<I, S>(mut self, category: impl Into<String>, probes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.critical_overrides
            .insert(category.into(), probes.into_iter().map(Into::into).collect());
        self
    }

    pub fn control_plane(mut self, endpoint: impl Into<String>, token: Option<String>) -> Self {
        self.control_plane = Some((endpoint.into(), token));
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn markdown(mut self, markdown: bool) -> Self {
        self.markdown = markdown;
        self
    }

    /// Accept a category name outside the built-in catalog (a plugged-in category).
    pub fn known_category(mut self, name: impl Into<String>) -> Self {
        self.extra_categories.insert(name.into());
        self
    }

    pub fn build(self) -> Result<RunConfig, ProdGuardError> {
        let raw_target = self
            .target
            .ok_or_else(|| ProdGuardError::Config("No target configured".into()))?;
        let target = Url::parse(&raw_target)
            .map_err(|e| ProdGuardError::Config(format!("Invalid target '{}': {}", raw_target, e)))?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(ProdGuardError::Config(format!(
                "Target must be http or https, got '{}'",
                target.scheme()
            )));
        }

        let control_plane = match self.control_plane {
            Some((endpoint, token)) => {
                let mut endpoint = Url::parse(&endpoint)
                    .map_err(|e| ProdGuardError::Config(format!("Invalid control plane endpoint: {}", e)))?;
                if !endpoint.path().ends_with('/') {
                    let path = format!("{}/", endpoint.path());
                    endpoint.set_path(&path);
                }
                Some(ControlPlaneSettings {
                    endpoint,
                    token: token.as_deref().and_then(resolve_credential),
                })
            }
            None => None,
        };

        let execution_order = match self.execution_order {
            Some(order) => order,
            None => default_execution_order(control_plane.is_some()),
        };
        validate_order(&execution_order, &self.extra_categories, control_plane.is_some())?;

        let mut concurrency = self.concurrency;
        if concurrency.mode == ConcurrencyMode::BoundedParallel && concurrency.max_concurrent == 0 {
            return Err(ProdGuardError::Config("max_concurrent must be at least 1".into()));
        }
        if self.environment.is_production() && concurrency.limit() > 1 {
            warn!(
                requested = concurrency.max_concurrent,
                "Production runs are sequential, clamping max_concurrent to 1"
            );
            concurrency = ConcurrencyPolicy::sequential();
        }

        let es = &self.emergency_stop;
        if !(0.0..=1.0).contains(&es.resource_threshold) {
            return Err(ProdGuardError::Config(format!(
                "resource_threshold must be within [0, 1], got {}",
                es.resource_threshold
            )));
        }
        if !(es.cost_threshold_usd >= 0.0) {
            return Err(ProdGuardError::Config(format!(
                "cost_threshold_usd must not be negative, got {}",
                es.cost_threshold_usd
            )));
        }
        if es.max_test_duration_ms == 0 {
            return Err(ProdGuardError::Config("max_test_duration_ms must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.pass_threshold) {
            return Err(ProdGuardError::Config(format!(
                "pass_threshold must be within [0, 1], got {}",
                self.pass_threshold
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(ProdGuardError::Config("poll_interval_ms must be positive".into()));
        }
        if self.rate_limit_budget == 0 {
            return Err(ProdGuardError::Config("rate_limit_requests must be at least 1".into()));
        }
        if !(self.cost_per_request_usd >= 0.0) {
            return Err(ProdGuardError::Config("cost_per_request_usd must not be negative".into()));
        }

        if self.environment.is_production() && !self.read_only {
            warn!("Read-only mode disabled for a production run");
        }
        if self.environment.is_production() && !es.auto_stop_enabled {
            warn!("Emergency auto-stop disabled for a production run");
        }

        Ok(RunConfig {
            environment: self.environment,
            target,
            execution_order,
            concurrency,
            retry: self.retry,
            read_only: self.read_only,
            dry_run: self.dry_run,
            pass_threshold: self.pass_threshold,
            emergency_stop: self.emergency_stop,
            poll_interval: self.poll_interval,
            probe_timeouts: self.probe_timeouts,
            rate_limit_budget: self.rate_limit_budget,
            request_capacity: self.request_capacity,
            cost_per_request_usd: self.cost_per_request_usd,
            critical_overrides: self.critical_overrides,
            control_plane,
            output_dir: self.output_dir,
            markdown: self.markdown,
        })
    }
}

/// HTTPS first, cheapest reads before the flood; monitoring only with a control plane.
pub fn default_execution_order(with_control_plane: bool) -> Vec<String> {
    let mut order = vec![
        CategoryKind::Https,
        CategoryKind::AccessControl,
        CategoryKind::AttackResistance,
        CategoryKind::RateLimiting,
    ];
    if with_control_plane {
        order.push(CategoryKind::Monitoring);
    }
    order.into_iter().map(|k| k.as_str().to_string()).collect()
}

fn validate_order(
    order: &[String],
    extra: &BTreeSet<String>,
    has_control_plane: bool,
) -> Result<(), ProdGuardError> {
    if order.is_empty() {
        return Err(ProdGuardError::Config("Execution order is empty".into()));
    }

    let mut seen = BTreeSet::new();
    for name in order {
        if !seen.insert(name.as_str()) {
            return Err(ProdGuardError::Config(format!("Category '{}' appears twice in execution order", name)));
        }
        match name.parse::<CategoryKind>() {
            Ok(kind) if kind.requires_control_plane() && !has_control_plane => {
                return Err(ProdGuardError::Config(format!(
                    "Category '{}' requires a control_plane endpoint",
                    name
                )));
            }
            Ok(_) => {}
            Err(_) if extra.contains(name) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
