//! Local retry of transient chain reads.
//!
//! # Responsibilities
//! - Retry reads that failed on transport trouble (RPC error, timeout)
//! - Never retry answers: reverts and node rejections surface immediately
//! - Space attempts with exponential backoff + jitter

use std::future::Future;

use crate::chain::types::ChainResult;
use crate::config::RetryConfig;
use crate::relay::clock::Clock;
use crate::resilience::backoff::calculate_backoff;

/// How many times, and how far apart, a transient failure is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first try.
    pub retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub const NONE: RetryPolicy = RetryPolicy {
        retries: 0,
        base_delay_ms: 0,
        max_delay_ms: 0,
    };
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            retries: config.transient_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

/// Run `call` until it succeeds, fails non-transiently, or the policy runs out.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    op: &'static str,
    mut call: F,
) -> ChainResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ChainResult<T>>,
{
    let mut retry = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && retry < policy.retries => {
                retry += 1;
                let delay = calculate_backoff(retry, policy.base_delay_ms, policy.max_delay_ms);
                tracing::debug!(
                    op,
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient chain error, retrying"
                );
                clock.sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::types::ChainError;
    use crate::relay::clock::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            base_delay_ms: 100,
            max_delay_ms: 1000,
        }
    }

    #[tokio::test]
    async fn test_recovers_from_transient_errors() {
        let clock = ManualClock::new();
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = retry_transient(&policy(2), &clock, "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ChainError::Rpc("connection reset".into()))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms of backoff, plus up to 10% jitter each
        assert!(clock.elapsed().as_millis() >= 300);
    }

    #[tokio::test]
    async fn test_gives_up_after_policy() {
        let clock = ManualClock::new();
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: ChainResult<()> = retry_transient(&policy(1), &clock, "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ChainError::Rpc("down".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_answers() {
        let clock = ManualClock::new();
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: ChainResult<()> = retry_transient(&policy(5), &clock, "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ChainError::Reverted("execution reverted".into()))
        })
        .await;

        assert_eq!(result, Err(ChainError::Reverted("execution reverted".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(clock.elapsed().as_millis(), 0);
    }
}
