//! Bounded retries for transaction submission.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Default number of submission attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 15;

/// Retry policy for transaction submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Immediate retries, used by tests and simulations.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
        }
    }
}

/// Runs `submit` until it succeeds or the policy's attempts are exhausted.
///
/// # Errors
/// Returns the last error, annotated with the attempt count.
pub async fn submit_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut submit: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match submit().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                return Err(e.context(format!("{operation} failed after {attempt} attempts")));
            }
            Err(e) => {
                warn!(
                    operation = operation,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    "Submission failed, retrying"
                );
                if !policy.delay.is_zero() {
                    sleep(policy.delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = submit_with_retry(&RetryPolicy::immediate(5), "add_liquidity", || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("blockhash expired");
            }
            Ok("signature")
        })
        .await;

        assert_eq!(result.unwrap(), "signature");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> =
            submit_with_retry(&RetryPolicy::immediate(3), "close_position", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("node is behind")
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(format!("{err:#}").contains("close_position failed after 3 attempts"));
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }
}
