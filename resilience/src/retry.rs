//! Retry-with-backoff-and-jitter, trimmed down from the teacher's
//! `RetryExecutor`/`BackoffStrategy`/`JitterConfig` in
//! `indexers::execution::error_handling` to the single exponential-with-full-jitter
//! policy distilled §5 calls for, with adjustable attempt counts for store vs.
//! network-flaky operations.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStrategy {
    Fixed,
    Linear { increment: Duration },
    Exponential { multiplier: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JitterKind {
    None,
    Full,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff: BackoffStrategy,
    pub jitter: JitterKind,
}

impl RetryPolicy {
    /// Default policy for graph/vector store calls (distilled §5: 3 attempts).
    pub fn for_store() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff: BackoffStrategy::Exponential { multiplier: 2.0 },
            jitter: JitterKind::Full,
        }
    }

    /// Default policy for network-flaky operations (distilled §5: 5 attempts).
    pub fn for_network() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff: BackoffStrategy::Exponential { multiplier: 2.0 },
            jitter: JitterKind::Full,
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = match self.backoff {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Linear { increment } => self.base_delay + increment * attempt,
            BackoffStrategy::Exponential { multiplier } => {
                let millis = self.base_delay.as_millis() as f64 * multiplier.powi(attempt as i32);
                Duration::from_millis(millis as u64)
            }
        };
        let capped = raw.min(self.max_delay);
        match self.jitter {
            JitterKind::None => capped,
            JitterKind::Full => {
                let jittered_millis = rand::thread_rng().gen_range(0..=capped.as_millis().max(1) as u64);
                Duration::from_millis(jittered_millis)
            }
        }
    }
}

/// Retries `is_retryable`-classified transient errors under `policy`, logging
/// each retry via [`raqe_observability::log_retry`].
pub async fn execute_with_retry<T, E, F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                tracing::warn!(
                    target: "retry",
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "retrying after error"
                );
                tokio::time::sleep(policy.delay_for_attempt(attempt - 1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff: BackoffStrategy::Fixed,
            jitter: JitterKind::None,
        };
        let result: Result<u32, &str> = execute_with_retry(
            "test_op",
            &policy,
            |_| true,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff: BackoffStrategy::Fixed,
            jitter: JitterKind::None,
        };
        let result: Result<u32, &str> =
            execute_with_retry("test_op", &policy, |_| true, || async { Err("always fails") }).await;
        assert_eq!(result, Err("always fails"));
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_errors() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::for_store();
        let result: Result<u32, &str> = execute_with_retry(
            "test_op",
            &policy,
            |_| false,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("permanent") }
            },
        )
        .await;
        assert_eq!(result, Err("permanent"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
