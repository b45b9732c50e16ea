//! SiteSync CLI - Command-line interface for SiteSync
//!
//! Provides commands for:
//! - Running a one-off sync against the administration server
//! - Viewing sync and network status
//! - Browsing local and server-side sync history
//! - Ingesting payloads uploaded by mobile devices
//! - Managing stored credentials and configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sitesync_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    auth::AuthCommand, completions::CompletionsCommand, config::ConfigCommand,
    history::HistoryCommand, ingest::IngestCommand, status::StatusCommand, sync::SyncCommand,
    CliContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "sitesync",
    version,
    about = "Workforce data synchronization for construction sites"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Push local changes to the administration server
    Sync(SyncCommand),
    /// Show sync and network status
    Status(StatusCommand),
    /// Show recent sync history
    History(HistoryCommand),
    /// Merge a payload uploaded by a mobile device
    Ingest(IngestCommand),
    /// Manage stored credentials
    #[command(subcommand)]
    Auth(AuthCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

impl Cli {
    fn context(&self) -> CliContext {
        CliContext {
            format: if self.json {
                OutputFormat::Json
            } else {
                OutputFormat::Human
            },
            config_path: self.config.clone().unwrap_or_else(Config::default_path),
            quiet: self.quiet,
        }
    }

    fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            (false, 2) => "debug",
            _ => "trace",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = cli.context();

    match &cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::History(cmd) => cmd.execute(&ctx).await,
        Commands::Ingest(cmd) => cmd.execute(&ctx).await,
        Commands::Auth(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(&ctx).await,
    }
}
