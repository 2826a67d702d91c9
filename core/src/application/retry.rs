// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Transport Retry
//
// Bounded exponential backoff around a single tag store call. Only
// retryable transport errors are retried; everything else is returned
// as soon as it is seen.

use std::future::Future;

use tracing::warn;

use crate::domain::config::RetryPolicy;
use crate::domain::tag_store::TagStoreError;

/// Successful value plus the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Failure after `attempts` tries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted {
    pub error: TagStoreError,
    pub attempts: u32,
}

pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<Retried<T>, Exhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TagStoreError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match call().await {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    attempts: attempt + 1,
                })
            }
            Err(error) if error.is_retryable() && attempt + 1 < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Tag store call failed, retrying: {}",
                    error
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                return Err(Exhausted {
                    error,
                    attempts: attempt + 1,
                })
            }
        }
    }
}
