pub mod credentials;
pub mod parser;
pub mod presets;
pub mod run_config;
pub mod schema;
pub mod security;
pub mod types;

pub use parser::{parse_config, parse_config_str};
pub use presets::{Environment, EnvironmentPreset};
pub use run_config::{default_execution_order, ControlPlaneSettings, RunConfig, RunConfigBuilder};
pub use types::*;
