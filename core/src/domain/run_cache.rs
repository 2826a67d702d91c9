// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Local Run Cache
//!
//! Remembers the build number claimed earlier in the same execution
//! graph so later stages republish it instead of claiming again. Where the
//! value is stored and how long it lives is up to the surrounding pipeline.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::counter::BuildNumber;

#[async_trait]
pub trait RunCache: Send + Sync {
    /// The value an earlier stage stored, if any.
    async fn read(&self) -> Result<Option<BuildNumber>, CacheError>;

    /// Store `value`. Writing the value already stored is a no-op; writing
    /// a different one is refused.
    async fn write(&self, value: BuildNumber) -> Result<(), CacheError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to access run cache {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Run cache {path:?} holds '{contents}', which is not a build number")]
    Corrupt { path: PathBuf, contents: String },

    #[error("Run cache already holds build number {cached}, refusing to write {attempted}")]
    Conflict {
        cached: BuildNumber,
        attempted: BuildNumber,
    },
}
