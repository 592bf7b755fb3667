// src/utils/retry.rs
use std::future::Future;
use std::time::Duration;

use crate::errors::{RideError, RideResult};

/// Hard cap on retries for any upstream call.
pub const MAX_RETRIES: usize = 1;

/// Bounded retry wrapper shared by every upstream call (mapping service, store).
///
/// Each attempt runs under `attempt_timeout`. Only transient errors are
/// retried, at most [`MAX_RETRIES`] times.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub attempt_timeout: Duration,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            attempt_timeout: Duration::from_secs(3),
            base_backoff_ms: 100,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, attempt_timeout: Duration, base_backoff_ms: u64) -> Self {
        Self {
            max_retries: max_retries.min(MAX_RETRIES),
            attempt_timeout,
            base_backoff_ms,
        }
    }

    pub fn with_timeout(&self, attempt_timeout: Duration) -> Self {
        Self {
            attempt_timeout,
            ..self.clone()
        }
    }

    /// Runs a single attempt bounded by the timeout. Used for writes, which
    /// must not be replayed when their outcome is unknown.
    pub async fn once<T, Fut>(&self, operation: &str, call: Fut) -> RideResult<T>
    where
        Fut: Future<Output = RideResult<T>>,
    {
        match tokio::time::timeout(self.attempt_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RideError::UpstreamUnavailable(format!(
                "{} timed out after {}ms",
                operation,
                self.attempt_timeout.as_millis()
            ))),
        }
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> RideResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RideResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.once(operation, call()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() || attempt > self.max_retries {
                return Err(err);
            }

            tracing::warn!(operation, attempt, error = %err, "retrying upstream call");
            tokio::time::sleep(Duration::from_millis(
                self.base_backoff_ms.saturating_mul(attempt as u64),
            ))
            .await;
        }
    }
}
