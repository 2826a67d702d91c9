// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # build-number
//!
//! Hands each CI run a monotonically increasing build number, using tags
//! in the repository itself as the shared counter.
//!
//! ## Commands
//!
//! - `build-number [next]` - Claim the next number (reuses the number already
//!   claimed by an earlier job of the same run)
//! - `build-number next --dry-run` - Show the number a claim would take
//! - `build-number current` - Publish the current number without claiming
//!
//! Inside GitHub Actions every input falls back to the runner's
//! environment (`INPUT_TOKEN`, `GITHUB_REPOSITORY`, `GITHUB_SHA`, ...).
//! Fatal errors are reported as `::error::` workflow commands.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use build_number::commands::{self, CounterArgs, NextCommand};

/// Allocate CI build numbers backed by repository tags
#[derive(Parser)]
#[command(name = "build-number")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    counter: CounterArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "BUILD_NUMBER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Claim the next build number (default)
    #[command(name = "next")]
    Next(NextCommand),

    /// Publish the current build number without claiming a new one
    #[command(name = "current")]
    Current,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A local .env is a convenience; its absence is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            println!("{}", commands::workflow_error(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_logging(&cli.log_level)?;

    match cli.command.unwrap_or(Commands::Next(NextCommand::default())) {
        Commands::Next(command) => commands::next::execute(command, &cli.counter).await,
        Commands::Current => commands::current::execute(&cli.counter).await,
    }
}

/// Initialize tracing subscriber for logging
///
/// Logs go to stderr; stdout is reserved for workflow commands.
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
