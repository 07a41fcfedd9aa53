//! CLI command definitions for buildfix.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::build::{BuildRunner, CommandBuildRunner};
use crate::config::{ApplyPolicy, RepairConfig};
use crate::extract::{ErrorExtractor, DEFAULT_TAIL_CHARS};
use crate::fix::{ApplyReport, FixApplicator, ItemStatus, ItemTarget};
use crate::llm::{ChatCompletionClient, LlmProvider};
use crate::repair::{RepairLoop, RepairOutcome};

/// LLM-driven build repair loop.
#[derive(Parser)]
#[command(name = "buildfix")]
#[command(about = "Repair a failing build by looping build, analyze, fix")]
#[command(version)]
#[command(
    long_about = "buildfix runs the project's build, extracts errors from the output, asks an \
OpenAI-compatible model for a JSON fix plan and applies it, retrying until the build passes \
or the attempt budget is spent.\n\nExample usage:\n  OPENAI_API_KEY=... buildfix run --project-root ./app --max-attempts 3"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the build-repair loop.
    Run(RunArgs),

    /// Extract errors from a saved build log and print them as JSON.
    Extract(ExtractArgs),

    /// Apply a saved fix plan response to a project.
    Apply(ApplyArgs),
}

/// Arguments for the run command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// YAML config file. Flags override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Project root; fixes may only touch files under it.
    #[arg(short, long)]
    pub project_root: Option<PathBuf>,

    /// Maximum number of build attempts.
    #[arg(short = 'n', long)]
    pub max_attempts: Option<u32>,

    /// Model identifier.
    #[arg(short, long, env = "BUILDFIX_MODEL")]
    pub model: Option<String>,

    /// API key for the completion endpoint.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, env = "OPENAI_API_BASE")]
    pub api_base: Option<String>,

    /// Build timeout in seconds.
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Stop applying a plan at its first failed item.
    #[arg(long)]
    pub strict: bool,

    /// Never run shell commands from fix plans.
    #[arg(long)]
    pub no_commands: bool,

    /// Print the run outcome as JSON.
    #[arg(short, long)]
    pub json: bool,

    /// Build program followed by its arguments (default: ./gradlew build --no-daemon --stacktrace).
    #[arg(last = true)]
    pub build_command: Vec<String>,
}

/// Arguments for the extract command.
#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// Saved build log.
    pub log_file: PathBuf,

    /// Keep only the last N characters of the log in the output.
    #[arg(long, default_value_t = DEFAULT_TAIL_CHARS)]
    pub tail: usize,
}

/// Arguments for the apply command.
#[derive(Parser, Debug)]
pub struct ApplyArgs {
    /// File holding a model response with a JSON fix plan.
    pub plan_file: PathBuf,

    /// Project root the plan applies to.
    #[arg(short, long, default_value = ".")]
    pub project_root: PathBuf,

    /// Stop at the first failed item.
    #[arg(long)]
    pub strict: bool,

    /// Never run shell commands from the plan.
    #[arg(long)]
    pub no_commands: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// Use this when you need access to CLI options (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_repair_command(args).await,
        Commands::Extract(args) => run_extract_command(args),
        Commands::Apply(args) => run_apply_command(args).await,
    }
}

// ============================================================================
// Run Command Implementation
// ============================================================================

/// Merges the optional YAML file with command-line overrides.
fn resolve_config(args: &RunArgs) -> anyhow::Result<RepairConfig> {
    let mut config = match &args.config {
        Some(path) => RepairConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RepairConfig::default(),
    };

    if let Some(root) = &args.project_root {
        config.project_root = root.clone();
    }
    if let Some(attempts) = args.max_attempts {
        config = config.with_max_attempts(attempts);
    }
    if let Some(model) = &args.model {
        config = config.with_model(model.clone());
    }
    if let Some(key) = &args.api_key {
        config = config.with_api_key(key.clone());
    }
    if let Some(base) = &args.api_base {
        config = config.with_api_base(base.clone());
    }
    if let Some(secs) = args.timeout {
        config = config.with_build_timeout(Duration::from_secs(secs));
    }
    if args.strict {
        config = config.with_apply_policy(ApplyPolicy::Strict);
    }
    if args.no_commands {
        config = config.with_commands(false);
    }
    if let Some((program, rest)) = args.build_command.split_first() {
        config = config.with_build_command(program.clone(), rest.to_vec());
    }

    Ok(config)
}

async fn run_repair_command(args: RunArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    config.validate()?;

    let runner = CommandBuildRunner::from_config(&config);
    info!(
        project_root = %config.project_root.display(),
        build = %runner.command_line(),
        model = %config.model,
        max_attempts = config.max_attempts,
        "Starting build repair"
    );

    let runner: Arc<dyn BuildRunner> = Arc::new(runner);
    let provider: Arc<dyn LlmProvider> = Arc::new(
        ChatCompletionClient::from_config(&config).context("Failed to create LLM client")?,
    );
    let outcome = RepairLoop::from_config(&config, runner, provider).run().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    if outcome.succeeded {
        Ok(())
    } else {
        anyhow::bail!(
            "Build still failing after {} attempt(s)",
            outcome.build_invocations
        )
    }
}

fn print_outcome(outcome: &RepairOutcome) {
    println!();
    println!("{}", "=".repeat(60));
    println!("  BUILD REPAIR SUMMARY");
    println!("{}", "=".repeat(60));
    for attempt in &outcome.attempts {
        let note = attempt.note.as_deref().unwrap_or("");
        println!(
            "  Attempt {}: {} (errors: {}, warnings: {}) {}",
            attempt.number, attempt.phase_reached, attempt.errors_found, attempt.warnings_found, note
        );
        if let Some(apply) = &attempt.apply {
            println!(
                "    fixes applied: {}/{}, failed: {}",
                apply.applied_count(),
                apply.items.len(),
                apply.failed_count()
            );
        }
    }
    println!("  Builds run: {}", outcome.build_invocations);
    println!(
        "  Result: {}",
        if outcome.succeeded { "SUCCESS" } else { "FAILED" }
    );
    println!("{}", "=".repeat(60));
}

// ============================================================================
// Extract Command Implementation
// ============================================================================

fn run_extract_command(args: ExtractArgs) -> anyhow::Result<()> {
    let log = fs::read_to_string(&args.log_file)
        .with_context(|| format!("Failed to read build log {}", args.log_file.display()))?;

    let context = ErrorExtractor::new(args.tail).extract(&log);
    if !context.has_errors() {
        warn!(log = %args.log_file.display(), "No errors found in build log");
    }
    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(())
}

// ============================================================================
// Apply Command Implementation
// ============================================================================

async fn run_apply_command(args: ApplyArgs) -> anyhow::Result<()> {
    let response = fs::read_to_string(&args.plan_file)
        .with_context(|| format!("Failed to read plan file {}", args.plan_file.display()))?;

    let mut config = RepairConfig::new(&args.project_root);
    if args.strict {
        config = config.with_apply_policy(ApplyPolicy::Strict);
    }
    if args.no_commands {
        config = config.with_commands(false);
    }
    config.validate_limits()?;
    if !config.project_root.is_dir() {
        anyhow::bail!(
            "Project root does not exist or is not a directory: {}",
            config.project_root.display()
        );
    }

    let report = FixApplicator::from_config(&config)
        .apply_response(&response)
        .await
        .context("Fix plan could not be parsed")?;
    print_apply_report(&report);

    if report.is_clean() {
        Ok(())
    } else {
        anyhow::bail!("{} item(s) failed", report.failed_count())
    }
}

fn print_apply_report(report: &ApplyReport) {
    if !report.analysis.is_empty() {
        println!("Analysis: {}", report.analysis);
    }
    for item in &report.items {
        let target = match &item.target {
            ItemTarget::File { path, action } => format!("{action} {path}"),
            ItemTarget::Command { command } => format!("run `{command}`"),
        };
        match &item.status {
            ItemStatus::Applied => println!("  [ok]       {target}"),
            ItemStatus::Skipped(reason) => println!("  [skipped]  {target}: {reason}"),
            ItemStatus::Failed(reason) => println!("  [failed]   {target}: {reason}"),
            ItemStatus::Rejected(reason) => println!("  [rejected] {target}: {reason}"),
        }
    }
    if report.aborted {
        println!("  (batch aborted)");
    }
}
