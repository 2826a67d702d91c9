// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `build-number next`
//!
//! Claims the next build number (the default command). With `--dry-run`
//! it only reports the value a claim would take.

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use build_number_core::application::Provenance;

use super::CounterArgs;

#[derive(Args, Debug, Clone, Default)]
pub struct NextCommand {
    /// Compute the next number without creating or deleting tags, publishing or caching
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(cmd: NextCommand, args: &CounterArgs) -> Result<()> {
    let service = args.service()?;

    if cmd.dry_run {
        let outcome = service
            .preview()
            .await
            .context("Failed to compute next build number")?;
        match outcome.provenance {
            Provenance::Cached => {
                info!("Build number {} already claimed in this run", outcome.value)
            }
            _ => info!("Next build number would be {}", outcome.value),
        }
        println!("{}", outcome.value);
        return Ok(());
    }

    let outcome = service.next().await.context("Failed to generate build number")?;

    if let Some(report) = &outcome.cleanup {
        for failure in &report.failed {
            warn!("Failed to delete ref {}: {}", failure.name, failure.error);
        }
    }
    info!(provenance = ?outcome.provenance, "Build number is {}", outcome.value);

    Ok(())
}
