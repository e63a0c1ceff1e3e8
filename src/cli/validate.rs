use std::path::PathBuf;

use crate::cli::commands::ValidateArgs;
use crate::config::{self, Environment, RunConfigBuilder};
use crate::errors::ProdGuardError;

pub async fn handle_validate(args: ValidateArgs) -> Result<i32, ProdGuardError> {
    let path = PathBuf::from(&args.config);
    let file_config = config::parse_config(&path).await?;

    let environment = match &args.environment {
        Some(name) => name.parse::<Environment>()?,
        None => file_config.environment.unwrap_or_default(),
    };

    // A file without a target is still a valid overlay.
    if file_config.target.is_some() {
        RunConfigBuilder::for_environment(environment)
            .apply_file(&file_config)
            .build()?;
    }

    println!("Configuration is valid: {} ({})", args.config, environment);
    Ok(0)
}
