//! Wharf CLI - validate workload manifests and deploy workloads.
//!
//! Commands:
//! - `wharf deploy` - Deploy a workload to an environment
//! - `wharf validate` - Validate a workload manifest
//! - `wharf config` - Manage configuration

mod commands;
mod config;
mod context;
mod local;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::{ConfigArgs, DeployArgs, ValidateArgs};

/// Wharf CLI - Validate manifests and deploy containerized workloads
#[derive(Parser)]
#[command(name = "wharf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a workload to an environment
    Deploy(DeployArgs),

    /// Validate a workload manifest
    Validate(ValidateArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .without_time()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // Load config
    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    // Execute command
    let result = match cli.command {
        Commands::Deploy(args) => commands::deploy::run(args, &ctx).await,
        Commands::Validate(args) => commands::validate::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.failure(&e);
        std::process::exit(1);
    }

    Ok(())
}
