// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cleanup Sweeper
//!
//! Removes counter tags superseded by a fresh claim. Deletions are issued
//! concurrently and independently; a failed deletion is logged and
//! reported, never propagated. Tags that survive are picked up by the
//! staleness check of a later run.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Best-effort removal of superseded counter tags

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::domain::counter::CounterReference;
use crate::domain::tag_store::{DeleteOutcome, TagStore, TagStoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub name: String,
    pub error: TagStoreError,
}

/// What happened to each sweep candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: Vec<String>,

    /// Already removed, most likely by a concurrent run
    pub already_gone: Vec<String>,

    pub failed: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct CleanupSweeper {
    store: Arc<dyn TagStore>,
}

impl CleanupSweeper {
    pub fn new(store: Arc<dyn TagStore>) -> Self {
        Self { store }
    }

    /// Delete every entry in `stale` except `claimed`.
    ///
    /// Must only be called after `claimed` was created successfully.
    pub async fn sweep(&self, stale: &[CounterReference], claimed: &str) -> CleanupReport {
        let candidates: Vec<&CounterReference> =
            stale.iter().filter(|r| r.name != claimed).collect();

        if candidates.is_empty() {
            debug!("No superseded counter tags to remove");
            return CleanupReport::default();
        }

        let deletions = candidates.iter().map(|reference| {
            let store = Arc::clone(&self.store);
            async move {
                let result = store.delete(&reference.name).await;
                (reference.name.clone(), result)
            }
        });

        let mut report = CleanupReport::default();
        for (name, result) in join_all(deletions).await {
            match result {
                Ok(DeleteOutcome::Deleted) => {
                    debug!(reference = %name, "Deleted superseded counter tag");
                    report.deleted.push(name);
                }
                Ok(DeleteOutcome::NotFound) => {
                    debug!(reference = %name, "Counter tag already removed");
                    report.already_gone.push(name);
                }
                Err(error) => {
                    warn!(reference = %name, "Failed to delete superseded counter tag: {}", error);
                    report.failed.push(CleanupFailure { name, error });
                }
            }
        }

        info!(
            deleted = report.deleted.len(),
            already_gone = report.already_gone.len(),
            failed = report.failed.len(),
            "Counter cleanup finished"
        );

        report
    }
}
