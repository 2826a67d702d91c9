// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Counter Configuration
//!
//! Built once at startup and handed to every component. Nothing below the
//! CLI reads the process environment.
//!
//! `CounterSettings` holds the tunables and may come from a YAML file:
//!
//! ```yaml
//! api_url: https://github.example.com/api/v3
//! cache_path: BUILD_NUMBER/BUILD_NUMBER
//! on_empty: fail
//! max_conflict_retries: 5
//! retry:
//!   max_attempts: 3
//!   initial_delay_ms: 500
//!   max_delay_ms: 8000
//! ```
//!
//! `CounterConfig` adds the per-run identity (repository, token, commit,
//! prefix) which always comes from flags or the pipeline environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::counter::CounterPrefix;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_CACHE_PATH: &str = "BUILD_NUMBER/BUILD_NUMBER";

/// What to do when a repository holds no counter tags yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyCounterPolicy {
    /// Claim build number 1.
    #[default]
    #[serde(alias = "start")]
    StartAtOne,

    /// Abort; an operator must seed the first tag.
    Fail,
}

impl FromStr for EmptyCounterPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "start" | "start_at_one" | "1" => Ok(Self::StartAtOne),
            "fail" | "error" => Ok(Self::Fail),
            other => Err(ConfigError::Invalid {
                field: "on_empty",
                reason: format!("expected 'start' or 'fail', got '{}'", other),
            }),
        }
    }
}

/// Bounded exponential backoff for transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt number `attempt` (zero based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt);
        Duration::from_millis(self.initial_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }

    /// No waiting between attempts. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8000
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_PATH)
}

fn default_max_conflict_retries() -> u32 {
    5
}

/// Tunables shared by every run against the same host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSettings {
    /// REST API root of the repository host
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Local Run Cache file, relative to the shared workspace
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    #[serde(default)]
    pub on_empty: EmptyCounterPolicy,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Fresh re-allocations allowed after losing a claim race
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

impl Default for CounterSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            cache_path: default_cache_path(),
            on_empty: EmptyCounterPolicy::default(),
            retry: RetryPolicy::default(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

impl CounterSettings {
    /// Load settings from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Parse settings from a YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let settings = serde_yaml::from_str(yaml)?;
        Ok(settings)
    }

    /// Load from an explicit path, or fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                tracing::info!("Loading settings from {:?}", path);
                Self::from_yaml_file(path)
                    .map_err(|e| anyhow::anyhow!("Failed to load settings at {:?}: {}", path, e))
            }
            None => Ok(Self::default()),
        }
    }
}

/// `owner/name` of the repository holding the counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryId {
    pub owner: String,
    pub name: String,
}

impl FromStr for RepositoryId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Invalid {
            field: "repository",
            reason: format!("expected 'owner/name', got '{}'", s),
        };

        let (owner, name) = s.trim().split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Everything one invocation needs, validated.
#[derive(Clone, PartialEq, Eq)]
pub struct CounterConfig {
    pub repository: RepositoryId,
    pub token: String,
    pub commit_sha: String,
    pub prefix: CounterPrefix,
    pub settings: CounterSettings,
}

// Hand-written so the token never reaches a log line.
impl fmt::Debug for CounterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterConfig")
            .field("repository", &self.repository)
            .field("token", &"***")
            .field("commit_sha", &self.commit_sha)
            .field("prefix", &self.prefix)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Unvalidated inputs, as collected from flags and environment.
#[derive(Debug, Clone, Default)]
pub struct CounterInputs {
    pub repository: Option<String>,
    pub token: Option<String>,
    pub commit_sha: Option<String>,
    pub prefix: Option<String>,
}

impl CounterConfig {
    /// Validates `inputs` into a config.
    ///
    /// Blank values count as missing, matching how pipelines pass unset inputs.
    pub fn build(inputs: CounterInputs, settings: CounterSettings) -> Result<Self, ConfigError> {
        let repository = required(inputs.repository, "GITHUB_REPOSITORY")?.parse()?;
        let token = required(inputs.token, "INPUT_TOKEN")?;
        let commit_sha = required(inputs.commit_sha, "GITHUB_SHA")?;

        let prefix = CounterPrefix::new(inputs.prefix.unwrap_or_default());
        if let Some(bad) = prefix
            .as_str()
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')))
        {
            return Err(ConfigError::Invalid {
                field: "prefix",
                reason: format!("character '{}' is not allowed in a tag prefix", bad),
            });
        }

        if settings.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            repository,
            token,
            commit_sha,
            prefix,
            settings,
        })
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Environment variable {0} is not defined.")]
    Missing(&'static str),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
