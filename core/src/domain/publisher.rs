// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Publisher
//!
//! Hands the final build number to the rest of the pipeline: as a step
//! output and as an environment binding, both carrying the same value.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::counter::BuildNumber;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, value: BuildNumber) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
