//! Adapter-level retry with exponential backoff.
//!
//! Transient backend failures ([`Error::BackendUnavailable`]) are retried a
//! bounded number of times (once by default) with exponential backoff from a
//! base delay (100ms by default). Anything else is returned immediately.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::error::{Error, Result};

/// Backoff parameters for one backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry; doubles for each further retry.
    pub base_delay: Duration,
    /// Retries after the initial attempt.
    pub max_retries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_retries: 1,
        }
    }
}

impl RetryPolicy {
    /// One retry after `base_delay`.
    pub fn once(base_delay: Duration) -> Self {
        Self {
            base_delay,
            max_retries: 1,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_retries: 0,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_factor(2.0)
            .with_max_times(self.max_retries)
    }

    /// Runs `operation`, retrying retryable failures per this policy.
    ///
    /// `label` names the call in log output.
    pub async fn run<F, Fut, T>(&self, label: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        operation
            .retry(self.backoff())
            .when(Error::is_retryable)
            .notify(|err: &Error, delay: Duration| {
                log::warn!("{label} failed ({err}); retrying in {delay:?}");
            })
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================
