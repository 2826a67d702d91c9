// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! GitHub Actions Publisher
//!
//! Publishes the build number the way the Actions runner expects:
//!
//! - environment binding: `BUILD_NUMBER=<n>` appended to `$GITHUB_ENV`
//! - step output: `build_number=<n>` appended to `$GITHUB_OUTPUT`, or the
//!   legacy `::set-output` workflow command on stdout for runners that
//!   predate output files

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::domain::counter::BuildNumber;
use crate::domain::publisher::{PublishError, Publisher};

pub const ENV_VARIABLE: &str = "BUILD_NUMBER";
pub const OUTPUT_NAME: &str = "build_number";

pub struct ActionsPublisher {
    env_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

impl ActionsPublisher {
    pub fn new(env_file: Option<PathBuf>, output_file: Option<PathBuf>) -> Self {
        Self { env_file, output_file }
    }
}

/// Legacy step output command.
pub fn set_output_command(name: &str, value: BuildNumber) -> String {
    format!("::set-output name={}::{}", name, value)
}

async fn append_line(path: &Path, line: &str) -> Result<(), PublishError> {
    let io_error = |source| PublishError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(io_error)?;

    file.write_all(format!("{}\n", line).as_bytes())
        .await
        .map_err(io_error)?;
    file.flush().await.map_err(io_error)
}

#[async_trait]
impl Publisher for ActionsPublisher {
    async fn publish(&self, value: BuildNumber) -> Result<(), PublishError> {
        match &self.env_file {
            Some(path) => append_line(path, &format!("{}={}", ENV_VARIABLE, value)).await?,
            None => warn!("GITHUB_ENV is not set, skipping {} environment binding", ENV_VARIABLE),
        }

        match &self.output_file {
            Some(path) => append_line(path, &format!("{}={}", OUTPUT_NAME, value)).await?,
            None => println!("{}", set_output_command(OUTPUT_NAME, value)),
        }

        info!(%value, "Published build number");
        Ok(())
    }
}
