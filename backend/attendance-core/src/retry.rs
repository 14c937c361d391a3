// src/retry.rs

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::error::EngineError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    fn delay_after(&self, error: &EngineError) -> Duration {
        match error {
            EngineError::RateLimited => self.base_delay * 2,
            _ => self.base_delay,
        }
    }
}

/// Runs one remote call with bounded retries.
///
/// Unauthorized and cancellation end the loop at once. Rate limiting waits
/// twice the base delay, everything else waits the base delay. The wrapped
/// call is re-issued as-is, so it must be safe to repeat.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestRetrier {
    policy: RetryPolicy,
}

impl RequestRetrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: &str,
        mut task: F,
        token: &CancellationToken,
    ) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<EngineError>,
    {
        let max_attempts = self.policy.max_retries.max(1);
        let mut attempt = 0;

        loop {
            if token.is_cancelled() {
                debug!("'{}' cancelled before attempt {}", operation, attempt + 1);
                return Err(EngineError::Cancelled);
            }
            attempt += 1;

            let error: EngineError = match task().await {
                Ok(value) => return Ok(value),
                Err(e) => e.into(),
            };

            match error {
                EngineError::Cancelled => return Err(EngineError::Cancelled),
                EngineError::Unauthorized => {
                    warn!("'{}' rejected as unauthorized; not retrying", operation);
                    return Err(EngineError::Unauthorized);
                }
                _ => {}
            }

            if attempt >= max_attempts {
                warn!(
                    "'{}' failed after {} attempts: {}",
                    operation, attempt, error
                );
                return Err(EngineError::Exhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = self.policy.delay_after(&error);
            debug!(
                "'{}' attempt {}/{} failed ({}); retrying in {:?}",
                operation, attempt, max_attempts, error, delay
            );

            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("'{}' cancelled during backoff", operation);
                    return Err(EngineError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn counting_task(
        calls: Arc<AtomicU32>,
        outcome: fn(u32) -> Result<&'static str, ApiError>,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<&'static str, ApiError>> + Send>>
    {
        move || {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                outcome(n)
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_exhausts_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let retrier = RequestRetrier::default();
        let token = CancellationToken::new();

        let result = retrier
            .execute(
                "fetch employee details",
                counting_task(calls.clone(), |_| {
                    Err(ApiError::NetworkUnavailable("connection refused".to_string()))
                }),
                &token,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(EngineError::Exhausted {
                operation,
                attempts,
                last,
            }) => {
                assert_eq!(operation, "fetch employee details");
                assert_eq!(attempts, 3);
                assert!(matches!(*last, EngineError::NetworkUnavailable(_)));
            }
            other => panic!("Expected Exhausted error but got: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let retrier = RequestRetrier::default();
        let token = CancellationToken::new();

        let result = retrier
            .execute(
                "fetch report",
                counting_task(calls.clone(), |_| Err(ApiError::Unauthorized)),
                &token,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result, Err(EngineError::Unauthorized));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_double_delay_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let retrier = RequestRetrier::default();
        let token = CancellationToken::new();
        let started = Instant::now();

        let result = retrier
            .execute(
                "fetch report",
                counting_task(calls.clone(), |n| {
                    if n == 1 {
                        Err(ApiError::RateLimited)
                    } else {
                        Ok("ok")
                    }
                }),
                &token,
            )
            .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert!(started.elapsed() < Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_counts_toward_attempt_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let retrier = RequestRetrier::default();
        let token = CancellationToken::new();

        let result = retrier
            .execute(
                "fetch report",
                counting_task(calls.clone(), |_| Err(ApiError::RateLimited)),
                &token,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(EngineError::Exhausted { attempts: 3, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_makes_no_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let retrier = RequestRetrier::default();
        let token = CancellationToken::new();
        token.cancel();

        let result = retrier
            .execute("fetch report", counting_task(calls.clone(), |_| Ok("ok")), &token)
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(result, Err(EngineError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops_retrying() {
        let calls = Arc::new(AtomicU32::new(0));
        let retrier = RequestRetrier::default();
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result = retrier
            .execute(
                "fetch report",
                counting_task(calls.clone(), |_| {
                    Err(ApiError::NetworkUnavailable("timeout".to_string()))
                }),
                &token,
            )
            .await;

        assert_eq!(result, Err(EngineError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_use_base_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let retrier = RequestRetrier::new(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
        });
        let token = CancellationToken::new();
        let started = Instant::now();

        let result = retrier
            .execute(
                "fetch report",
                counting_task(calls.clone(), |n| {
                    if n < 2 {
                        Err(ApiError::Decode("truncated".to_string()))
                    } else {
                        Ok("ok")
                    }
                }),
                &token,
            )
            .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(started.elapsed() < Duration::from_millis(200));
    }
}
