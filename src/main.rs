mod cmd;
mod config;
mod context;
mod domain;
mod error;
mod infra;
mod logging;
mod services;
mod session;
#[cfg(test)]
mod testing;
mod workflow;

use clap::{Parser, Subcommand};

use crate::cmd::browse::{self, BrowseArgs};
use crate::cmd::config::{self as config_cmd, ConfigArgs};
use crate::config::AppConfig;
use crate::error::AppResult;

#[derive(Parser)]
#[command(
    name = "tdeck",
    author,
    version,
    about = "Browse, lock and export Jira tickets from the terminal"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive ticket shell (default).
    Browse(BrowseArgs),
    /// Manage the stored connection settings.
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() {
    logging::init_logging();

    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config(args)) => config_cmd::run(args.command),
        Some(Commands::Browse(args)) => run_browse(args).await,
        None => run_browse(BrowseArgs::default()).await,
    }
}

async fn run_browse(args: BrowseArgs) -> AppResult<()> {
    let cwd = std::env::current_dir()?;
    let config = AppConfig::load(&cwd)?;
    browse::run(config, args).await
}
