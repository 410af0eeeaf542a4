use std::{future::Future, time::Duration};

use tracing::warn;

/// Fixed-interval retry budget for one download. No exponential backoff,
/// no jitter; every attempt restarts the engine from scratch.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Runs `op` up to `policy.attempts` times, sleeping `policy.delay` between
/// failures. Returns the first success, or the last error once the budget
/// is exhausted.
pub async fn run<T, F, Fut>(policy: &RetryPolicy, op: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    tryhard::retry_fn(op)
        .retries(policy.attempts.saturating_sub(1))
        .fixed_backoff(policy.delay)
        .on_retry(|attempt, _next_delay, err| {
            let e = err.to_string();

            async move {
                warn!(attempt, ?e, "Download attempt failed, retrying");
            }
        })
        .await
}
