use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ProdGuardError, RetryPolicy};
use crate::monitor::EmergencyStopConfig;
use crate::runner::ConcurrencyPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Staging,
    Development,
}

/// Defaults an environment starts from before file and CLI overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentPreset {
    pub concurrency: ConcurrencyPolicy,
    pub retry: RetryPolicy,
    pub read_only: bool,
    pub emergency_stop: EmergencyStopConfig,
    pub pass_threshold: f64,
    pub rate_limit_budget: u32,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Development => "development",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn preset(&self) -> EnvironmentPreset {
        match self {
            Self::Production => EnvironmentPreset {
                concurrency: ConcurrencyPolicy::sequential(),
                retry: RetryPolicy { max_retries: 2, retry_delay_ms: 5_000 },
                read_only: true,
                emergency_stop: EmergencyStopConfig {
                    max_test_duration_ms: 15 * 60 * 1000,
                    resource_threshold: 0.8,
                    cost_threshold_usd: 10.0,
                    auto_stop_enabled: true,
                },
                pass_threshold: 0.8,
                rate_limit_budget: 50,
            },
            Self::Staging => EnvironmentPreset {
                concurrency: ConcurrencyPolicy::bounded(3),
                retry: RetryPolicy { max_retries: 3, retry_delay_ms: 2_000 },
                read_only: true,
                emergency_stop: EmergencyStopConfig {
                    max_test_duration_ms: 30 * 60 * 1000,
                    resource_threshold: 0.9,
                    cost_threshold_usd: 25.0,
                    auto_stop_enabled: true,
                },
                pass_threshold: 0.7,
                rate_limit_budget: 100,
            },
            Self::Development => EnvironmentPreset {
                concurrency: ConcurrencyPolicy::bounded(5),
                retry: RetryPolicy { max_retries: 1, retry_delay_ms: 500 },
                read_only: false,
                emergency_stop: EmergencyStopConfig {
                    max_test_duration_ms: 60 * 60 * 1000,
                    resource_threshold: 0.95,
                    cost_threshold_usd: 50.0,
                    auto_stop_enabled: false,
                },
                pass_threshold: 0.5,
                rate_limit_budget: 200,
            },
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ProdGuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" | "stage" => Ok(Self::Staging),
            "development" | "dev" => Ok(Self::Development),
            other => Err(ProdGuardError::Config(format!("Unknown environment: {}", other))),
        }
    }
}
