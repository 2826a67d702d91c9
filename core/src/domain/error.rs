// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Errors that abort a run.
//!
//! Cleanup failures are absent on purpose: they are reported through
//! `CleanupReport` and never fail the run.

use crate::domain::config::ConfigError;
use crate::domain::counter::CounterError;
use crate::domain::publisher::PublishError;
use crate::domain::run_cache::CacheError;
use crate::domain::tag_store::TagStoreError;

#[derive(Debug, thiserror::Error)]
pub enum BuildNumberError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Failed to {operation} after {attempts} attempt(s): {source}")]
    Transport {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: TagStoreError,
    },

    #[error("Lost the race for a new build number {attempts} time(s) in a row, giving up")]
    ConflictRetriesExhausted { attempts: u32 },

    #[error(transparent)]
    Counter(#[from] CounterError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl BuildNumberError {
    /// True when the tag namespace needs an operator before any run can succeed.
    pub fn requires_operator(&self) -> bool {
        matches!(
            self,
            BuildNumberError::Counter(CounterError::CorruptedCounterState { .. })
                | BuildNumberError::Counter(CounterError::NoCounter { .. })
        )
    }
}
