// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Shared doubles for the protocol tests. Not every test binary uses every
// item, so dead_code warnings are silenced here.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use build_number_core::domain::counter::{BuildNumber, CounterReference};
use build_number_core::domain::publisher::{PublishError, Publisher};
use build_number_core::domain::run_cache::{CacheError, RunCache};
use build_number_core::domain::tag_store::{
    CreateOutcome, DeleteOutcome, TagStore, TagStoreError, TransportKind,
};

#[derive(Debug, Default)]
struct Faults {
    list_failures: u32,
    create_failures: u32,
    lost_create_responses: u32,
    racing_claimants: Vec<String>,
    overtaken_creates: Vec<String>,
    failing_deletes: HashSet<String>,
}

/// Tag store over a map, with scripted failures and competing claimants.
///
/// Create-if-absent is atomic under the lock, like the real host.
#[derive(Debug, Default)]
pub struct ScriptedTagStore {
    tags: Mutex<BTreeMap<String, String>>,
    faults: Mutex<Faults>,
    list_calls: AtomicU32,
    create_calls: AtomicU32,
    delete_calls: AtomicU32,
}

impl ScriptedTagStore {
    pub fn with_tags(tags: &[(&str, &str)]) -> Self {
        let store = Self::default();
        for (name, commit) in tags {
            store.insert(name, commit);
        }
        store
    }

    pub fn insert(&self, name: &str, commit: &str) {
        self.tags.lock().insert(name.to_string(), commit.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.lock().contains_key(name)
    }

    pub fn commit_of(&self, name: &str) -> Option<String> {
        self.tags.lock().get(name).cloned()
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.tags.lock().keys().cloned().collect()
    }

    /// The next `times` listings fail with a server error.
    pub fn fail_next_lists(&self, times: u32) {
        self.faults.lock().list_failures = times;
    }

    /// The next `times` creations fail with a server error before touching state.
    pub fn fail_next_creates(&self, times: u32) {
        self.faults.lock().create_failures = times;
    }

    /// The next creation is applied but its response is lost in transit.
    pub fn lose_next_create_response(&self) {
        self.faults.lock().lost_create_responses += 1;
    }

    /// A run on `commit` claims the requested name just before our next creation lands.
    pub fn race_next_create(&self, commit: &str) {
        self.faults.lock().racing_claimants.push(commit.to_string());
    }

    /// A run on `commit` claims the requested name while our next creation
    /// fails with a server error.
    pub fn overtake_next_create(&self, commit: &str) {
        self.faults.lock().overtaken_creates.push(commit.to_string());
    }

    /// Every deletion of `name` fails with a server error.
    pub fn fail_delete_of(&self, name: &str) {
        self.faults.lock().failing_deletes.insert(name.to_string());
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Total calls of any kind.
    pub fn interactions(&self) -> u32 {
        self.list_calls() + self.create_calls() + self.delete_calls()
    }
}

fn take(counter: &mut u32) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

fn server_error(message: &str) -> TagStoreError {
    TagStoreError::transport(TransportKind::Server, message)
}

#[async_trait]
impl TagStore for ScriptedTagStore {
    async fn list(&self, stem: &str) -> Result<Vec<CounterReference>, TagStoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if take(&mut self.faults.lock().list_failures) {
            return Err(server_error("HTTP 502: injected"));
        }

        let tags = self.tags.lock();
        Ok(tags
            .iter()
            .filter(|(name, _)| name.starts_with(stem))
            .map(|(name, commit)| CounterReference::new(name.clone(), commit.clone()))
            .collect())
    }

    async fn create(&self, name: &str, commit: &str) -> Result<CreateOutcome, TagStoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let (fail, overtaken, race, lose) = {
            let mut faults = self.faults.lock();
            let fail = take(&mut faults.create_failures);
            let overtaken = if fail || faults.overtaken_creates.is_empty() {
                None
            } else {
                Some(faults.overtaken_creates.remove(0))
            };
            let race = if fail || overtaken.is_some() || faults.racing_claimants.is_empty() {
                None
            } else {
                Some(faults.racing_claimants.remove(0))
            };
            let lose = !fail && overtaken.is_none() && take(&mut faults.lost_create_responses);
            (fail, overtaken, race, lose)
        };

        if fail {
            return Err(server_error("HTTP 503: injected"));
        }

        let mut tags = self.tags.lock();
        if let Some(rival) = overtaken {
            tags.entry(name.to_string()).or_insert(rival);
            return Err(server_error("HTTP 503: injected"));
        }
        if let Some(rival) = race {
            tags.entry(name.to_string()).or_insert(rival);
        }

        if tags.contains_key(name) {
            return Ok(CreateOutcome::Conflict);
        }
        tags.insert(name.to_string(), commit.to_string());

        if lose {
            return Err(TagStoreError::transport(
                TransportKind::Network,
                "connection reset: injected",
            ));
        }
        Ok(CreateOutcome::Created)
    }

    async fn delete(&self, name: &str) -> Result<DeleteOutcome, TagStoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        if self.faults.lock().failing_deletes.contains(name) {
            return Err(server_error("HTTP 500: injected"));
        }

        match self.tags.lock().remove(name) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::NotFound),
        }
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<BuildNumber>>,
}

impl RecordingPublisher {
    pub fn published(&self) -> Vec<BuildNumber> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, value: BuildNumber) -> Result<(), PublishError> {
        self.published.lock().push(value);
        Ok(())
    }
}

/// Run cache that always misses and cannot be written.
pub struct ReadOnlyRunCache;

#[async_trait]
impl RunCache for ReadOnlyRunCache {
    async fn read(&self) -> Result<Option<BuildNumber>, CacheError> {
        Ok(None)
    }

    async fn write(&self, _value: BuildNumber) -> Result<(), CacheError> {
        Err(CacheError::Io {
            path: "BUILD_NUMBER/BUILD_NUMBER".into(),
            source: std::io::Error::other("disk full"),
        })
    }
}
