//! Bounded retry with exponential backoff.

use std::future::Future;

use statesync_core::SyncError;
use tracing::warn;

use crate::config::RetryPolicy;

/// A failed attempt, as reported to the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Attempts still allowed after this one.
    pub remaining: u32,
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `policy.attempts` attempts have been made.
///
/// Waits `initial_delay * backoff_factor^(n-1)` after failed attempt `n`.
/// `observer` sees every failed attempt and has no influence on control flow.
/// Exhausting the attempts returns the last error tagged with the attempt count.
pub async fn run<T, F, Fut>(
    policy: &RetryPolicy,
    mut observer: impl FnMut(FailedAttempt, &SyncError),
    mut operation: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let remaining = if err.is_retryable() {
            attempts - attempt
        } else {
            0
        };
        observer(FailedAttempt { attempt, remaining }, &err);

        if remaining == 0 {
            return Err(SyncError::RetriesExhausted {
                attempts: attempt,
                source: Box::new(err),
            });
        }

        tokio::time::sleep(policy.delay_for(attempt)).await;
    }
}

/// [`run`] with an observer that logs each failed attempt under `label`.
pub async fn run_logged<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    run(
        policy,
        |failed, err| {
            warn!(
                attempt = failed.attempt,
                remaining = failed.remaining,
                "{} failed: {}",
                label,
                err
            )
        },
        operation,
    )
    .await
}
