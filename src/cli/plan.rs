use crate::cli::commands::RunArgs;
use crate::config::RunConfig;
use crate::errors::ProdGuardError;
use crate::pipeline::RunPlan;

pub async fn handle_plan(mut args: RunArgs) -> Result<i32, ProdGuardError> {
    args.dry_run = true;
    let config = super::run::resolve_config(&args).await?;
    print_plan(&config, args.json)
}

pub fn print_plan(config: &RunConfig, json: bool) -> Result<i32, ProdGuardError> {
    let plan = RunPlan::builtin(config);
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", plan.render_text());
    }
    Ok(0)
}
