//! RelayClaw CLI: the main entry point.
//!
//! Commands:
//! - `run`   : Start the runtime (default)
//! - `tools` : Print the tool catalogue the model sees
//! - `skills`: List installed skills
//! - `config`: Print the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "relayclaw",
    about = "RelayClaw: conversational agent runtime",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: relayclaw.toml)
    #[arg(short, long, global = true, env = "RELAYCLAW_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the runtime: console, scheduler and agent
    Run,

    /// Print the tool catalogue as JSON
    Tools,

    /// List installed skills
    Skills,

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run::run(config_path).await?,
        Commands::Tools => commands::tools::run(config_path)?,
        Commands::Skills => commands::skills::run(config_path)?,
        Commands::Config => commands::config_cmd::run(config_path)?,
    }

    Ok(())
}
