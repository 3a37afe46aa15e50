//! CLI for the FetchX bulk downloader.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use fetchx_core::config;
use fetchx_core::controller::JobController;
use fetchx_core::orchestrator::Orchestrator;
use fetchx_core::store::JobStore;
use std::sync::Arc;

use commands::{run_ack, run_completions, run_man, run_pause, run_resume, run_start, run_status, run_stop};

/// Top-level CLI for FetchX.
#[derive(Debug, Parser)]
#[command(name = "fetchx")]
#[command(about = "FetchX: bulk-download stock images and videos across providers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Start a new job and run it in the foreground.
    Start {
        /// Search query sent to every provider.
        query: String,
        /// "images" or "videos"; anything else means images.
        #[arg(long, default_value = "images", value_name = "TYPE")]
        media_type: String,
        /// Number of assets to download.
        #[arg(long, short = 'n', value_name = "N")]
        count: u64,
    },

    /// Pause the active job (signals the process running it, if any).
    Pause,

    /// Resume the paused job in the foreground.
    Resume,

    /// Stop the active job and discard its state. Downloaded files are kept.
    Stop,

    /// Show the active job.
    Status,

    /// Clear a finished job.
    Ack,

    /// Print shell completions to stdout.
    Completions {
        /// Target shell.
        shell: Shell,
    },

    /// Print the man page to stdout.
    Man,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Completions { shell } => return run_completions(shell),
            CliCommand::Man => return run_man(),
            _ => {}
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let store = JobStore::open_default().await?;
        let orchestrator = Orchestrator::from_config(&cfg, store)?;
        let controller = Arc::new(JobController::new(Arc::new(orchestrator)));

        match cli.command {
            CliCommand::Start {
                query,
                media_type,
                count,
            } => run_start(controller, &query, &media_type, count).await?,
            CliCommand::Pause => run_pause(&controller).await?,
            CliCommand::Resume => run_resume(controller).await?,
            CliCommand::Stop => run_stop(&controller).await?,
            CliCommand::Status => run_status(&controller).await?,
            CliCommand::Ack => run_ack(&controller).await?,
            CliCommand::Completions { .. } | CliCommand::Man => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
