// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Remote Tag Store
//!
//! Domain interface for the repository host that owns the counter tags.
//! Implementations live in `crate::infrastructure`.
//!
//! Creation of a uniquely named tag is the only atomic operation the
//! protocol relies on: two claimants racing for the same name get exactly
//! one `Created` and one `Conflict`.

use std::fmt;

use async_trait::async_trait;

use crate::domain::counter::CounterReference;

#[async_trait]
pub trait TagStore: Send + Sync {
    /// Tags whose name starts with `stem`. An absent namespace is an empty list.
    async fn list(&self, stem: &str) -> Result<Vec<CounterReference>, TagStoreError>;

    /// Create tag `name` pointing at `commit`, unless it already exists.
    async fn create(&self, name: &str, commit: &str) -> Result<CreateOutcome, TagStoreError>;

    /// Remove tag `name`.
    async fn delete(&self, name: &str) -> Result<DeleteOutcome, TagStoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// A tag with that exact name already exists
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Category of a failed exchange with the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Network,
    Authentication,
    RateLimit,
    Server,
    /// The host refused the request for a reason retrying will not fix
    Rejected,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportKind::Network => "network",
            TransportKind::Authentication => "authentication",
            TransportKind::RateLimit => "rate limit",
            TransportKind::Server => "server",
            TransportKind::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TagStoreError {
    #[error("{kind} error: {message}")]
    Transport { kind: TransportKind, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl TagStoreError {
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        TagStoreError::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TagStoreError::Transport { kind, .. } if *kind != TransportKind::Rejected
        )
    }
}
