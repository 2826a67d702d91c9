// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `build-number current`
//!
//! Publishes the counter's current value without claiming a new one.

use anyhow::{Context, Result};
use tracing::info;

use super::CounterArgs;

pub async fn execute(args: &CounterArgs) -> Result<()> {
    let outcome = args
        .service()?
        .current()
        .await
        .context("Failed to read current build number")?;

    info!(provenance = ?outcome.provenance, "Build number is {}", outcome.value);
    Ok(())
}
