//! SupportIQ - customer-support analytics from the command line
//!
//! Main entry point for the SupportIQ CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod browser;
mod callback_server;
mod commands;

use commands::{api, auth};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// SupportIQ - customer-support analytics from the command line
#[derive(Parser)]
#[command(name = "supportiq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding config.toml, the session file and logs
    #[arg(long, global = true, env = "SUPPORTIQ_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in, inspect or clear stored credentials
    Auth(auth::AuthArgs),

    /// Send an authenticated request to any backend endpoint
    Request(api::RequestArgs),

    /// List analysed calls (or show one by ID)
    List(api::ListArgs),

    /// Show the entity extraction summary
    Entities,
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = cli
        .config_dir
        .clone()
        .or_else(supportiq_config::user_config_dir)
        .unwrap_or_else(|| PathBuf::from(".supportiq"));

    // Initialize tracing: console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "supportiq=debug,supportiq_auth=debug,supportiq_client=debug,supportiq_config=debug,tower_http=debug,info"
    } else {
        "supportiq=info,supportiq_auth=info,supportiq_client=info,warn"
    };

    let file_appender = tracing_appender::rolling::daily(config_dir.join("logs"), "supportiq.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "supportiq=trace,supportiq_auth=trace,supportiq_client=trace,supportiq_config=trace,info",
                )),
        )
        .init();

    let loaded =
        supportiq_config::load_config_with_options(None, Some(&config_dir), |key| {
            std::env::var(key).ok()
        })?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    tracing::debug!(
        sources = ?loaded.loaded_from(),
        env = ?loaded.env_overrides,
        "Configuration loaded"
    );

    // Create context for commands
    let ctx = commands::Context {
        config: loaded.config,
        config_dir,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::Request(args) => api::run_request(args, &ctx).await,
        Commands::List(args) => api::run_list(args, &ctx).await,
        Commands::Entities => api::run_entities(&ctx).await,
    }
}
