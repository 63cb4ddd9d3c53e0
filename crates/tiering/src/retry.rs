// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Per-operation timeout and retry for store calls
//!
//! Every store primitive used by the sweeps is idempotent (overwrite by name,
//! delete by key, upsert by id), so a transient failure is simply re-issued.

use crate::Result;
use crate::config::OperationConfig;
use crate::error::{Tier, TieringError};
use backon::{ExponentialBuilder, Retryable};
use diagnostics::*;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OperationPolicy {
    timeout: Duration,
    max_retries: usize,
    min_backoff: Duration,
    max_backoff: Duration,
}

impl OperationPolicy {
    #[must_use]
    pub fn new(config: &OperationConfig) -> Self {
        Self {
            timeout: config.timeout,
            max_retries: config.max_retries,
            min_backoff: config.min_backoff,
            max_backoff: config.max_backoff,
        }
    }

    /// Single attempt, no backoff; used by tests and latency-sensitive callers
    #[must_use]
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            timeout,
            max_retries: 0,
            min_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_backoff)
            .with_max_delay(self.max_backoff)
            .with_max_times(self.max_retries)
            .with_jitter()
    }

    /// Run `op` under the timeout, retrying transient failures with backoff
    pub async fn run<T, F, Fut>(&self, tier: Tier, operation: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.timeout;
        let attempt = || {
            let fut = op();
            async move {
                match tokio::time::timeout(timeout, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(TieringError::Timeout {
                        tier,
                        operation,
                        elapsed: timeout,
                    }),
                }
            }
        };

        attempt
            .retry(self.backoff())
            .when(TieringError::is_transient)
            .notify(|err: &TieringError, delay: Duration| {
                warn!(
                    "retrying {tier} {operation} in {delay_ms}ms: {error}",
                    tier: tier.to_string(),
                    operation: operation,
                    delay_ms: delay.as_millis() as u64,
                    error: err.to_string()
                );
            })
            .await
    }
}
