// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the build-number CLI
//!
//! Every input has an environment fallback matching what the GitHub
//! Actions runner provides, so inside a workflow the binary usually runs
//! without flags. The environment is read here, once, by clap; everything
//! downstream receives an explicit `CounterConfig`.

pub mod current;
pub mod next;

pub use self::next::NextCommand;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use build_number_core::application::BuildNumberService;
use build_number_core::domain::config::{CounterConfig, CounterInputs, CounterSettings};
use build_number_core::domain::error::BuildNumberError;
use build_number_core::infrastructure::{ActionsPublisher, FileRunCache, GitHubTagStore};

#[derive(Args, Debug, Clone, Default)]
pub struct CounterArgs {
    /// Token with permission to create and delete tags
    #[arg(long, global = true, env = "INPUT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Repository holding the counter tags (owner/name)
    #[arg(long, global = true, env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,

    /// Commit a newly claimed tag points at
    #[arg(long, global = true, env = "GITHUB_SHA")]
    pub sha: Option<String>,

    /// Counter namespace; tags become <prefix>-build-number-<n>
    #[arg(long, global = true, env = "INPUT_PREFIX")]
    pub prefix: Option<String>,

    /// What to do when no counter tag exists yet (start, fail)
    #[arg(long, global = true, env = "INPUT_ON_EMPTY")]
    pub on_empty: Option<String>,

    /// REST API root of the repository host
    #[arg(long, global = true, env = "GITHUB_API_URL")]
    pub api_url: Option<String>,

    /// Run cache file shared between jobs of one workflow run
    #[arg(long, global = true, env = "BUILD_NUMBER_CACHE_PATH", value_name = "FILE")]
    pub cache_path: Option<PathBuf>,

    /// File receiving the BUILD_NUMBER environment binding
    #[arg(long, global = true, env = "GITHUB_ENV", value_name = "FILE")]
    pub github_env: Option<PathBuf>,

    /// File receiving the build_number step output
    #[arg(long, global = true, env = "GITHUB_OUTPUT", value_name = "FILE")]
    pub github_output: Option<PathBuf>,

    /// YAML settings file (retry policy, API root, cache path, ...)
    #[arg(short, long, global = true, env = "BUILD_NUMBER_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl CounterArgs {
    /// Settings from `--config` (or defaults) with flag overrides applied.
    pub fn settings(&self) -> Result<CounterSettings> {
        let mut settings = CounterSettings::load_or_default(self.config.as_deref())?;

        if let Some(api_url) = non_blank(&self.api_url) {
            settings.api_url = api_url.to_string();
        }
        if let Some(cache_path) = &self.cache_path {
            settings.cache_path = cache_path.clone();
        }
        if let Some(on_empty) = non_blank(&self.on_empty) {
            settings.on_empty = on_empty.parse().map_err(BuildNumberError::from)?;
        }

        Ok(settings)
    }

    pub fn counter_config(&self) -> Result<CounterConfig> {
        let inputs = CounterInputs {
            repository: self.repository.clone(),
            token: self.token.clone(),
            commit_sha: self.sha.clone(),
            prefix: self.prefix.clone(),
        };
        let config =
            CounterConfig::build(inputs, self.settings()?).map_err(BuildNumberError::from)?;
        Ok(config)
    }

    /// Wire the service against GitHub, the workspace cache file and the Actions runner.
    pub fn service(&self) -> Result<BuildNumberService> {
        let config = self.counter_config()?;
        tracing::debug!(?config, "Resolved configuration");

        let store = GitHubTagStore::new(
            config.settings.api_url.clone(),
            config.repository.clone(),
            config.token.clone(),
        )
        .context("Failed to create GitHub client")?;
        let cache = FileRunCache::new(config.settings.cache_path.clone());
        let publisher = ActionsPublisher::new(self.github_env.clone(), self.github_output.clone());

        Ok(BuildNumberService::new(
            config,
            Arc::new(store),
            Arc::new(cache),
            Arc::new(publisher),
        ))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Escape data for a workflow command (`%`, CR and LF are significant to the runner).
fn escape_workflow_data(data: &str) -> String {
    data.replace('%', "%25").replace('\r', "%0D").replace('\n', "%0A")
}

/// Render a fatal error as an Actions `::error::` workflow command.
pub fn workflow_error(err: &anyhow::Error) -> String {
    let mut message = format!("ERROR: {:#}", err);
    if err
        .downcast_ref::<BuildNumberError>()
        .map(BuildNumberError::requires_operator)
        .unwrap_or(false)
    {
        message.push_str("\nThe build-number tags need manual attention before runs can continue.");
    }
    format!("::error::{}", escape_workflow_data(&message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use build_number_core::domain::config::EmptyCounterPolicy;
    use build_number_core::domain::counter::CounterError;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        counter: CounterArgs,
    }

    fn parse(args: &[&str]) -> CounterArgs {
        let mut argv = vec!["build-number"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().counter
    }

    #[test]
    fn test_flags_build_a_config() {
        let args = parse(&[
            "--token",
            "t",
            "--repository",
            "octo/widgets",
            "--sha",
            "abc123",
            "--prefix",
            "web",
            "--on-empty",
            "fail",
            "--api-url",
            "https://ghe.example.com/api/v3",
        ]);

        let config = args.counter_config().unwrap();
        assert_eq!(config.prefix.stem(), "web-build-number-");
        assert_eq!(config.settings.on_empty, EmptyCounterPolicy::Fail);
        assert_eq!(config.settings.api_url, "https://ghe.example.com/api/v3");
    }

    #[test]
    fn test_missing_token_is_a_configuration_error() {
        let args = CounterArgs {
            repository: Some("octo/widgets".to_string()),
            sha: Some("abc123".to_string()),
            ..CounterArgs::default()
        };

        let err = args.counter_config().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildNumberError>(),
            Some(BuildNumberError::Configuration(_))
        ));
        assert!(err.to_string().contains("INPUT_TOKEN"));
    }

    #[test]
    fn test_settings_file_is_overridden_by_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "on_empty: fail\nmax_conflict_retries: 9\n").unwrap();

        let args = CounterArgs {
            config: Some(path),
            on_empty: Some("start".to_string()),
            ..CounterArgs::default()
        };

        let settings = args.settings().unwrap();
        assert_eq!(settings.on_empty, EmptyCounterPolicy::StartAtOne);
        assert_eq!(settings.max_conflict_retries, 9);
    }

    #[test]
    fn test_workflow_error_is_single_line() {
        let err = anyhow::Error::from(BuildNumberError::Counter(CounterError::NoCounter {
            stem: "build-number-".to_string(),
        }));

        let line = workflow_error(&err);
        assert!(line.starts_with("::error::ERROR: No build-number- refs in repository."));
        assert!(line.contains("%0AThe build-number tags need manual attention"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_escape_workflow_data() {
        assert_eq!(escape_workflow_data("50%\r\ndone"), "50%25%0D%0Adone");
    }
}
