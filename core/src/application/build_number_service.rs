// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Build Number Service
//!
//! Runs the counter protocol end to end for one invocation:
//!
//! 1. Local Run Cache hit → republish, no network traffic
//! 2. Read a snapshot of the counter tags (transport retries with backoff)
//! 3. Allocate the next value, refusing a corrupted namespace
//! 4. Claim it by creating a uniquely named tag
//! 5. On `Conflict`, go back to 2 with a fresh snapshot (bounded)
//! 6. Sweep the superseded tags, best effort
//! 7. Publish, then write the Local Run Cache, best effort
//!
//! The tag creation in step 4 is the only mutual exclusion there is.
//! Nothing here assumes the window between 2 and 4 is race-free.
//!
//! A `Conflict` is never resolved by looking at who owns the tag: runs on
//! the same commit are indistinguishable, so a tag this invocation created
//! with its response lost is simply re-allocated past and swept as stale.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Optimistic-concurrency allocation over a shared tag namespace

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::cleanup::{CleanupReport, CleanupSweeper};
use crate::application::retry::{with_backoff, Exhausted};
use crate::domain::config::CounterConfig;
use crate::domain::counter::{allocate, inspect, BuildNumber, CounterError, CounterSnapshot};
use crate::domain::error::BuildNumberError;
use crate::domain::publisher::Publisher;
use crate::domain::run_cache::RunCache;
use crate::domain::tag_store::{CreateOutcome, TagStore};

/// Where a returned build number came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Republished from the Local Run Cache
    Cached,
    /// Freshly claimed; `rounds` counts allocation rounds including lost races
    Claimed { rounds: u32 },
    /// Current value read without claiming
    Observed,
    /// Computed but not claimed (dry run)
    Preview,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildNumberOutcome {
    pub value: BuildNumber,
    pub provenance: Provenance,
    /// Present only for fresh claims
    pub cleanup: Option<CleanupReport>,
    /// Why the claimed value could not be stored in the Local Run Cache
    pub cache_failure: Option<String>,
}

impl BuildNumberOutcome {
    fn new(value: BuildNumber, provenance: Provenance) -> Self {
        Self {
            value,
            provenance,
            cleanup: None,
            cache_failure: None,
        }
    }
}

pub struct BuildNumberService {
    config: CounterConfig,
    store: Arc<dyn TagStore>,
    cache: Arc<dyn RunCache>,
    publisher: Arc<dyn Publisher>,
    sweeper: CleanupSweeper,
}

fn transport(operation: &'static str) -> impl FnOnce(Exhausted) -> BuildNumberError {
    move |exhausted| BuildNumberError::Transport {
        operation,
        attempts: exhausted.attempts,
        source: exhausted.error,
    }
}

impl BuildNumberService {
    pub fn new(
        config: CounterConfig,
        store: Arc<dyn TagStore>,
        cache: Arc<dyn RunCache>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let sweeper = CleanupSweeper::new(Arc::clone(&store));
        Self {
            config,
            store,
            cache,
            publisher,
            sweeper,
        }
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    /// Claim the next build number, or reuse the one claimed earlier in this execution graph.
    pub async fn next(&self) -> Result<BuildNumberOutcome, BuildNumberError> {
        if let Some(outcome) = self.republish_cached().await? {
            return Ok(outcome);
        }

        let prefix = &self.config.prefix;
        let settings = &self.config.settings;
        let max_rounds = settings.max_conflict_retries.saturating_add(1);

        for round in 1..=max_rounds {
            let snapshot = self.read_snapshot().await?;
            let allocation = allocate(&snapshot, prefix, settings.on_empty)?;

            match allocation.current {
                Some(current) => info!("Last build number was {}.", current),
                None => info!(
                    "No {} refs available, starting at {}.",
                    prefix.stem(),
                    allocation.next
                ),
            }

            let tag = prefix.tag_name(allocation.next);
            match self.claim(&tag).await? {
                CreateOutcome::Created => {
                    info!(reference = %tag, round, "Claimed build number {}", allocation.next);

                    let report = self.sweeper.sweep(&allocation.stale, &tag).await;
                    if !report.is_clean() {
                        warn!(
                            failed = report.failed.len(),
                            "Some superseded counter tags were left for a later run"
                        );
                    }

                    self.publisher.publish(allocation.next).await?;

                    let cache_failure = match self.cache.write(allocation.next).await {
                        Ok(()) => None,
                        Err(err) => {
                            warn!(
                                "Failed to remember build number {} for later jobs: {}",
                                allocation.next, err
                            );
                            Some(err.to_string())
                        }
                    };

                    return Ok(BuildNumberOutcome {
                        value: allocation.next,
                        provenance: Provenance::Claimed { rounds: round },
                        cleanup: Some(report),
                        cache_failure,
                    });
                }
                CreateOutcome::Conflict => {
                    warn!(
                        reference = %tag,
                        round,
                        max_rounds,
                        "Another run claimed {} first, re-reading the counter",
                        allocation.next
                    );
                    if round < max_rounds {
                        tokio::time::sleep(settings.retry.delay_for(round - 1)).await;
                    }
                }
            }
        }

        Err(BuildNumberError::ConflictRetriesExhausted { attempts: max_rounds })
    }

    /// Publish the counter's current value without claiming a new one.
    pub async fn current(&self) -> Result<BuildNumberOutcome, BuildNumberError> {
        if let Some(outcome) = self.republish_cached().await? {
            return Ok(outcome);
        }

        let snapshot = self.read_snapshot().await?;
        let state = inspect(&snapshot, &self.config.prefix)?;
        let value = state.current.ok_or_else(|| CounterError::NoCounter {
            stem: self.config.prefix.stem(),
        })?;

        info!("Last build number was {}.", value);
        self.publisher.publish(value).await?;

        Ok(BuildNumberOutcome::new(value, Provenance::Observed))
    }

    /// Compute the value `next` would claim, without touching the store,
    /// the publisher or the cache.
    pub async fn preview(&self) -> Result<BuildNumberOutcome, BuildNumberError> {
        if let Some(cached) = self.cache.read().await? {
            return Ok(BuildNumberOutcome::new(cached, Provenance::Cached));
        }

        let snapshot = self.read_snapshot().await?;
        let allocation = allocate(&snapshot, &self.config.prefix, self.config.settings.on_empty)?;

        Ok(BuildNumberOutcome::new(allocation.next, Provenance::Preview))
    }

    async fn republish_cached(&self) -> Result<Option<BuildNumberOutcome>, BuildNumberError> {
        let Some(cached) = self.cache.read().await? else {
            return Ok(None);
        };

        info!(
            "Build number already generated in earlier jobs, using build number {}...",
            cached
        );
        self.publisher.publish(cached).await?;

        Ok(Some(BuildNumberOutcome::new(cached, Provenance::Cached)))
    }

    async fn read_snapshot(&self) -> Result<CounterSnapshot, BuildNumberError> {
        let stem = self.config.prefix.stem();
        let listed = with_backoff(&self.config.settings.retry, "list counter tags", || {
            self.store.list(&stem)
        })
        .await
        .map_err(transport("list counter tags"))?;

        Ok(CounterSnapshot::new(listed.value))
    }

    async fn claim(&self, tag: &str) -> Result<CreateOutcome, BuildNumberError> {
        let commit = self.config.commit_sha.as_str();
        let created = with_backoff(&self.config.settings.retry, "create counter tag", || {
            self.store.create(tag, commit)
        })
        .await
        .map_err(transport("create counter tag"))?;

        Ok(created.value)
    }
}
