use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::cli::commands::RunArgs;
use crate::config::{self, Environment, ProdGuardConfig, RunConfig, RunConfigBuilder};
use crate::errors::ProdGuardError;
use crate::pipeline::{RunOutcome, TestOrchestrator};
use crate::reporting::{markdown, ReportArtifact};
use crate::utils::formatting::{format_duration, format_score};

/// Preset, then file, then command line.
pub async fn resolve_config(args: &RunArgs) -> Result<RunConfig, ProdGuardError> {
    let file_config = match &args.config {
        Some(path) => config::parse_config(&PathBuf::from(path)).await?,
        None => ProdGuardConfig::default(),
    };

    let environment = match &args.environment {
        Some(name) => name.parse::<Environment>()?,
        None => file_config.environment.unwrap_or_default(),
    };

    let mut builder = RunConfigBuilder::for_environment(environment).apply_file(&file_config);
    if let Some(target) = &args.target {
        builder = builder.target(target.clone());
    }
    if let Some(categories) = &args.categories {
        builder = builder.execution_order(
            categories.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        );
    }
    if args.dry_run {
        builder = builder.dry_run(true);
    }
    if args.no_read_only {
        builder = builder.read_only(false);
    }
    if let Some(output) = &args.output {
        builder = builder.output_dir(output.clone());
    }
    if args.markdown {
        builder = builder.markdown(true);
    }
    builder.build()
}

pub async fn handle_run(args: RunArgs) -> Result<i32, ProdGuardError> {
    let config = resolve_config(&args).await?;
    if config.dry_run {
        return super::plan::print_plan(&config, args.json);
    }

    let output_dir = config.output_dir.clone();
    let write_markdown = config.markdown;

    let orchestrator = TestOrchestrator::builtin(config)?;
    let stop = orchestrator.stop_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current category");
            stop.request_stop();
        }
    });

    let outcome = orchestrator.run().await;
    ctrl_c.abort();

    Ok(publish_outcome(&outcome, &output_dir, write_markdown).await)
}

/// Prints the outcome, then writes the reports. A report that cannot be
/// written fails the command, but never hides the summary.
pub async fn publish_outcome(outcome: &RunOutcome, output_dir: &Path, write_markdown: bool) -> i32 {
    print_outcome(outcome);

    let artifact = ReportArtifact::from_outcome(outcome);
    let mut exit_code = outcome.exit_code();
    match artifact.write(output_dir).await {
        Ok(path) => println!("Report: {}", path.display()),
        Err(e) => {
            error!(error = %e, dir = %output_dir.display(), "Failed to write JSON report");
            exit_code = 1;
        }
    }
    if write_markdown {
        if let Err(e) = markdown::write(&artifact, output_dir).await {
            error!(error = %e, "Failed to write Markdown report");
        }
    }

    info!(exit_code, "Done");
    exit_code
}

fn print_outcome(outcome: &RunOutcome) {
    let s = &outcome.summary;
    println!(
        "{} {} in {}: score {}, {} passed, {} failed, {} skipped, {} issues",
        if outcome.success { "PASSED" } else { "FAILED" },
        outcome.target,
        format_duration(outcome.duration_ms),
        format_score(s.overall_security_score),
        s.passed_tests,
        s.failed_tests,
        s.skipped_tests,
        s.critical_issues,
    );
    if let Some(reason) = &outcome.trip_reason {
        println!("Emergency stop: {}", reason);
    }
    for rec in &s.recommendations {
        println!("  - {}", rec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prodguard.yaml");
        tokio::fs::write(
            &path,
            "environment: staging\ntarget: https://file.example.com\nexecution:\n  order: [https]\n",
        )
        .await
        .unwrap();

        let args = RunArgs {
            config: Some(path.display().to_string()),
            target: Some("https://cli.example.com".into()),
            categories: Some("access-control, https".into()),
            dry_run: true,
            ..Default::default()
        };
        let config = resolve_config(&args).await.unwrap();
        assert_eq!(config.environment, Environment::Staging);
        assert_eq!(config.target.as_str(), "https://cli.example.com/");
        assert_eq!(config.execution_order, vec!["access-control", "https"]);
        assert!(config.dry_run);
        assert!(config.read_only);
    }

    #[tokio::test]
    async fn test_environment_flag_wins() {
        let args = RunArgs {
            environment: Some("development".into()),
            target: Some("https://dev.example.com".into()),
            no_read_only: true,
            ..Default::default()
        };
        let config = resolve_config(&args).await.unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert!(!config.read_only);
    }

    #[tokio::test]
    async fn test_missing_target_is_config_error() {
        let err = resolve_config(&RunArgs::default()).await.unwrap_err();
        assert!(matches!(err, ProdGuardError::Config(_)));
    }

    fn outcome(success: bool) -> RunOutcome {
        RunOutcome {
            run_id: "run-publish".into(),
            environment: Environment::Staging,
            target: "https://staging.example.com/".into(),
            started_at: chrono::Utc::now(),
            status: crate::pipeline::RunStatus::Completed,
            success,
            results: Vec::new(),
            summary: Default::default(),
            errors: Vec::new(),
            trip_reason: None,
            duration_ms: 5,
        }
    }

    #[tokio::test]
    async fn test_publish_writes_report_and_keeps_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(publish_outcome(&outcome(true), dir.path(), true).await, 0);
        assert!(dir.path().join("prodguard-report-run-publish.md").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_unwritable_report_dir_still_returns_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let output_dir = blocker.join("reports");

        assert_eq!(publish_outcome(&outcome(true), &output_dir, true).await, 1);
        assert_eq!(publish_outcome(&outcome(false), &output_dir, false).await, 1);
        assert!(!output_dir.exists());
    }
}
