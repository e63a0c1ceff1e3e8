use serde::Serialize;

use crate::config::{Environment, RunConfig};
use crate::errors::RetryPolicy;
use crate::monitor::EmergencyStopConfig;
use crate::probes::catalog::CategoryKind;
use crate::runner::{CategorySpec, ConcurrencyPolicy};
use crate::utils::formatting::{format_cost, format_duration};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbePlan {
    pub name: String,
    pub timeout_ms: u64,
    pub critical: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryPlan {
    pub name: String,
    pub tracked_vuln_classes: u32,
    pub implicit_timeout_ms: u64,
    pub probes: Vec<ProbePlan>,
}

/// What a run would do, resolved without sending a single request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunPlan {
    pub environment: Environment,
    pub target: String,
    pub read_only: bool,
    pub concurrency: ConcurrencyPolicy,
    pub retry: RetryPolicy,
    pub pass_threshold: f64,
    pub emergency_stop: EmergencyStopConfig,
    pub rate_limit_budget: u32,
    pub control_plane: Option<String>,
    pub categories: Vec<CategoryPlan>,
}

impl RunPlan {
    /// Plan over the given specs, in execution order, with critical overrides applied.
    pub fn new(config: &RunConfig, specs: &[CategorySpec]) -> Self {
        let categories = config
            .execution_order
            .iter()
            .filter_map(|name| specs.iter().find(|s| &s.name == name))
            .map(|spec| {
                let override_set = config.critical_override(&spec.name);
                CategoryPlan {
                    name: spec.name.clone(),
                    tracked_vuln_classes: spec.tracked_vuln_classes,
                    implicit_timeout_ms: spec.implicit_timeout().as_millis() as u64,
                    probes: spec
                        .probes
                        .iter()
                        .map(|p| ProbePlan {
                            name: p.name().to_string(),
                            timeout_ms: p.timeout().as_millis() as u64,
                            critical: match override_set {
                                Some(names) => names.iter().any(|n| n == p.name()),
                                None => spec.is_critical(p.name()),
                            },
                        })
                        .collect(),
                }
            })
            .collect();

        Self {
            environment: config.environment,
            target: config.target.to_string(),
            read_only: config.read_only,
            concurrency: config.concurrency,
            retry: config.retry,
            pass_threshold: config.pass_threshold,
            emergency_stop: config.emergency_stop.clone(),
            rate_limit_budget: config.rate_limit_budget,
            control_plane: config.control_plane.as_ref().map(|cp| cp.endpoint.to_string()),
            categories,
        }
    }

    /// Plan over the built-in catalog.
    pub fn builtin(config: &RunConfig) -> Self {
        let specs: Vec<CategorySpec> = config
            .execution_order
            .iter()
            .filter_map(|name| name.parse::<CategoryKind>().ok())
            .map(|kind| CategorySpec::builtin(kind, &config.probe_timeouts))
            .collect();
        Self::new(config, &specs)
    }

    pub fn probe_count(&self) -> usize {
        self.categories.iter().map(|c| c.probes.len()).sum()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Dry run for {} ({})\n", self.target, self.environment));
        out.push_str(&format!(
            "  mode: {}, concurrency: {}, retries: {} x {}\n",
            if self.read_only { "read-only" } else { "read-write" },
            self.concurrency.limit(),
            self.retry.max_retries,
            format_duration(self.retry.retry_delay_ms),
        ));
        out.push_str(&format!(
            "  emergency stop: {} max, resource {:.2}, cost {}, auto-stop {}\n",
            format_duration(self.emergency_stop.max_test_duration_ms),
            self.emergency_stop.resource_threshold,
            format_cost(self.emergency_stop.cost_threshold_usd),
            if self.emergency_stop.auto_stop_enabled { "on" } else { "off" },
        ));
        out.push_str(&format!("  pass threshold: {:.2}\n", self.pass_threshold));
        for (i, category) in self.categories.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} (timeout {})\n",
                i + 1,
                category.name,
                format_duration(category.implicit_timeout_ms)
            ));
            for probe in &category.probes {
                out.push_str(&format!(
                    "   - {}{} ({})\n",
                    probe.name,
                    if probe.critical { " [critical]" } else { "" },
                    format_duration(probe.timeout_ms)
                ));
            }
        }
        out
    }
}
