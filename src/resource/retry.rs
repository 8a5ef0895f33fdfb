//! Fixed-interval retry with an attempt cap, optional deadline and cancellation

use anyhow::{bail, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Attempts made to delete a resource after its dependents are removed
pub const DEFAULT_MAX_ATTEMPTS: u32 = 40;

/// Pause between delete attempts
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    /// Give up once this much time has passed since the first attempt
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    pub const fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_MAX_ATTEMPTS, DEFAULT_INTERVAL)
    }
}

/// Run `op` until it succeeds or the policy is exhausted
///
/// `op` receives the 1-based attempt number. When attempts run out, the
/// deadline passes, or `cancel` fires, the last error is returned.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if attempt >= max_attempts {
            tracing::warn!("giving up after {} attempts: {:#}", attempt, err);
            return Err(err);
        }

        if let Some(deadline) = policy.deadline {
            if started.elapsed() + policy.interval > deadline {
                tracing::warn!(
                    "retry deadline of {:?} reached after {} attempts",
                    deadline,
                    attempt
                );
                return Err(err);
            }
        }

        tracing::debug!(
            "attempt {} failed, retrying in {:?}: {:#}",
            attempt,
            policy.interval,
            err
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::warn!("retry cancelled after {} attempts", attempt);
                return Err(err.context("retry cancelled"));
            }
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }
}

/// Run `fut` unless `cancel` fires first
pub async fn until_cancelled<T, Fut>(cancel: &CancellationToken, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    tokio::select! {
        result = fut => result,
        _ = cancel.cancelled() => {
            tracing::warn!("operation cancelled");
            bail!("Interrupted")
        }
    }
}
