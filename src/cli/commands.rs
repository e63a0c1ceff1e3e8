use clap::{Args, Parser, Subcommand};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("PRODGUARD_GIT_HASH"),
    " ",
    env!("PRODGUARD_BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "prodguard",
    version,
    long_version = LONG_VERSION,
    about = "Production-safe security validation runner"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the configured security categories against the target
    Run(RunArgs),
    /// Show what a run would do without sending any request
    Plan(RunArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Environment preset: production, staging, development
    #[arg(short, long)]
    pub environment: Option<String>,

    /// Target base URL (overrides the config file)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Comma-separated categories to run, in order
    #[arg(long)]
    pub categories: Option<String>,

    /// Resolve and print the plan, execute nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Allow state-changing control-plane calls
    #[arg(long)]
    pub no_read_only: bool,

    /// Directory for report files
    #[arg(short, long)]
    pub output: Option<String>,

    /// Also write a Markdown report
    #[arg(long)]
    pub markdown: bool,

    /// Print the plan as JSON (dry run only)
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Path to config file
    pub config: String,

    /// Also resolve the full run configuration for this environment
    #[arg(short, long)]
    pub environment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_globals() {
        let cli = Cli::try_parse_from([
            "prodguard", "-vv", "--log-json", "run", "--config", "prodguard.yaml",
            "--environment", "staging", "--no-read-only", "--categories", "https,rate-limiting",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.log_json);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config.as_deref(), Some("prodguard.yaml"));
                assert_eq!(args.environment.as_deref(), Some("staging"));
                assert!(args.no_read_only);
                assert!(!args.dry_run);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from(["prodguard", "validate", "prodguard.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::Validate(ref a) if a.config == "prodguard.yaml"));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
