// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! File Run Cache
//!
//! Plain-text file holding the decimal build number and nothing else.
//! The file's presence is the sentinel for "already allocated in this
//! execution graph"; the pipeline shares it between jobs (typically as an
//! artifact) and discards it when the graph ends.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::counter::BuildNumber;
use crate::domain::run_cache::{CacheError, RunCache};

pub struct FileRunCache {
    path: PathBuf,
}

impl FileRunCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl RunCache for FileRunCache {
    async fn read(&self) -> Result<Option<BuildNumber>, CacheError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let trimmed = contents.trim();
        trimmed
            .parse::<BuildNumber>()
            .map(Some)
            .map_err(|_| CacheError::Corrupt {
                path: self.path.clone(),
                contents: trimmed.to_string(),
            })
    }

    async fn write(&self, value: BuildNumber) -> Result<(), CacheError> {
        match self.read().await? {
            Some(cached) if cached == value => {
                debug!(path = ?self.path, %value, "Run cache already up to date");
                return Ok(());
            }
            Some(cached) => {
                return Err(CacheError::Conflict {
                    cached,
                    attempted: value,
                })
            }
            None => {}
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        tokio::fs::write(&self.path, value.to_string())
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(path = ?self.path, %value, "Wrote run cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileRunCache::new(dir.path().join("BUILD_NUMBER").join("BUILD_NUMBER"));

        assert_eq!(cache.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BUILD_NUMBER").join("BUILD_NUMBER");
        let cache = FileRunCache::new(&path);

        cache.write(BuildNumber::new(42)).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "42");
        assert_eq!(cache.read().await.unwrap(), Some(BuildNumber::new(42)));
    }

    #[tokio::test]
    async fn test_rewrite_same_value_is_noop_and_different_value_refused() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileRunCache::new(dir.path().join("cache"));

        cache.write(BuildNumber::new(7)).await.unwrap();
        cache.write(BuildNumber::new(7)).await.unwrap();

        let err = cache.write(BuildNumber::new(8)).await.unwrap_err();
        assert!(matches!(err, CacheError::Conflict { .. }));
        assert_eq!(cache.read().await.unwrap(), Some(BuildNumber::new(7)));
    }

    #[tokio::test]
    async fn test_tolerates_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache");
        std::fs::write(&path, "19\n").unwrap();

        assert_eq!(FileRunCache::new(&path).read().await.unwrap(), Some(BuildNumber::new(19)));
    }

    #[tokio::test]
    async fn test_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache");
        std::fs::write(&path, "forty-two").unwrap();

        let err = FileRunCache::new(&path).read().await.unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { contents, .. } if contents == "forty-two"));
    }
}
