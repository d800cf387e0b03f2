//! Bounded retry around provider calls
//!
//! Retrying a flaky network call is a different concern from the engine's
//! own iteration budget: a retried call still counts as one iteration.
//! Each attempt carries a timeout; a timed-out call is a failed call.

use crate::error::{Result, TimekillError};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries and barely waits, for tests
    pub fn immediate() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
            call_timeout: Duration::from_secs(5),
        }
    }
}

/// Run `operation` up to `policy.max_attempts` times with exponential
/// backoff between attempts. Returns the first success or the last error.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match timeout(policy.call_timeout, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                if attempt >= policy.max_attempts {
                    return Err(e);
                }
                warn!("{} attempt {} failed: {}", op_name, attempt, e);
            }
            Err(_) => {
                if attempt >= policy.max_attempts {
                    return Err(TimekillError::ProviderUnavailable(format!(
                        "{} timed out after {:?}",
                        op_name, policy.call_timeout
                    )));
                }
                warn!("{} attempt {} timed out", op_name, attempt);
            }
        }

        let delay = policy.base_delay * 2u32.pow(attempt - 1);
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            call_timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&test_policy(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, TimekillError>(42) }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&test_policy(), "op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(TimekillError::ProviderUnavailable("flaky".to_string()))
                } else {
                    Ok("ok")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&test_policy(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TimekillError::ProviderUnavailable("down".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let result: Result<()> = with_retry(&test_policy(), "slow-op", || async {
            sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        match result {
            Err(TimekillError::ProviderUnavailable(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected timeout error, got {:?}", other.map(|_| ())),
        }
    }
}
