use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;

use crate::configs::Retry;
use crate::errors::{GatewayError, RetryError};

/// Attempt budget and backoff shape for one kind of fallible call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub attempt_timeout: Duration,
}

const NOTIFICATION_MAX_DELAY: Duration = Duration::from_secs(30);

impl RetryPolicy {
    pub fn device_read(retry: &Retry) -> Self {
        Self::with_attempts(retry, 5)
    }

    pub fn device_write(retry: &Retry) -> Self {
        Self::with_attempts(retry, 3)
    }

    pub fn notification(retry: &Retry) -> Self {
        let policy = Self::with_attempts(retry, 3);
        Self {
            max_delay: policy.max_delay.min(NOTIFICATION_MAX_DELAY),
            ..policy
        }
    }

    fn with_attempts(retry: &Retry, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(retry.base_delay_ms),
            max_delay: Duration::from_millis(retry.max_delay_ms),
            attempt_timeout: Duration::from_secs(retry.attempt_timeout_secs),
        }
    }

    /// Delay before retrying after the given failed attempt (1-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Longest time one `execute` call can take.
    pub fn worst_case(&self) -> Duration {
        (self.attempt_timeout + self.max_delay.mul_f64(1.1)).saturating_mul(self.max_attempts)
    }
}

/// Adds up to 10% of uniform jitter.
pub fn jittered(delay: Duration) -> Duration {
    let spread = delay.as_secs_f64() * 0.1;
    if spread <= 0.0 {
        return delay;
    }

    delay + Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..spread))
}

/// Resolves once shutdown is requested. Pends forever if the sender is gone.
pub(crate) async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Runs operations under a [`RetryPolicy`], abandoning backoff on shutdown.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    shutdown: watch::Receiver<bool>,
}

impl RetryExecutor {
    pub fn new(shutdown: watch::Receiver<bool>) -> Self {
        Self { shutdown }
    }

    pub async fn execute<T, F, Fut>(
        &self,
        name: &'static str,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut shutdown = self.shutdown.clone();
        let max_attempts = policy.max_attempts.max(1);
        let mut last_error: Option<GatewayError> = None;
        let mut attempt = 0;

        loop {
            if *shutdown.borrow() {
                return Err(RetryError::Cancelled {
                    attempts: attempt,
                    error: last_error,
                });
            }

            attempt += 1;
            let result = match tokio::time::timeout(policy.attempt_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout(policy.attempt_timeout)),
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation = name, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                tracing::warn!(operation = name, attempt, kind = error.kind(), "{error}");
                return Err(RetryError::NotRetryable {
                    attempts: attempt,
                    error,
                });
            }

            if attempt >= max_attempts {
                tracing::warn!(operation = name, attempt, "retries exhausted: {error}");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    error,
                });
            }

            let delay = jittered(policy.backoff(attempt));
            tracing::debug!(
                operation = name,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "attempt failed: {error}"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancelled(&mut shutdown) => {
                    return Err(RetryError::Cancelled {
                        attempts: attempt,
                        error: Some(error),
                    });
                }
            }

            last_error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            attempt_timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_backoff_doubles_until_capped() {
        let policy = policy(10);

        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(6), Duration::from_secs(32));
        assert_eq!(policy.backoff(7), Duration::from_secs(60));
        assert_eq!(policy.backoff(40), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        for _ in 0..100 {
            let delay = jittered(Duration::from_secs(10));
            assert!(delay >= Duration::from_secs(10));
            assert!(delay <= Duration::from_secs(11));
        }
        assert_eq!(jittered(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_policy_table() {
        let retry = Retry::default();

        assert_eq!(RetryPolicy::device_read(&retry).max_attempts, 5);
        assert_eq!(RetryPolicy::device_write(&retry).max_attempts, 3);
        assert_eq!(RetryPolicy::notification(&retry).max_attempts, 3);
        assert_eq!(
            RetryPolicy::notification(&retry).max_delay,
            Duration::from_secs(30)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_then_success() {
        let (_tx, rx) = watch::channel(false);
        let executor = RetryExecutor::new(rx);
        let calls = Arc::new(AtomicU32::new(0));

        let result = executor
            .execute("read", &policy(5), || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(GatewayError::Transient("flaky".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let (_tx, rx) = watch::channel(false);
        let executor = RetryExecutor::new(rx);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute("write", &policy(3), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(GatewayError::Transient(format!("failure {n}"))) }
            })
            .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                error: GatewayError::Transient("failure 2".into()),
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let (_tx, rx) = watch::channel(false);
        let executor = RetryExecutor::new(rx);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute("read", &policy(5), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GatewayError::Authentication("revoked".into())) }
            })
            .await;

        assert!(matches!(
            result,
            Err(RetryError::NotRetryable { attempts: 1, .. })
        ));
        assert!(result.unwrap_err().is_authentication());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out() {
        let (_tx, rx) = watch::channel(false);
        let executor = RetryExecutor::new(rx);
        let mut policy = policy(2);
        policy.attempt_timeout = Duration::from_secs(5);

        let result: Result<(), _> = executor
            .execute("read", &policy, || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 2,
                error: GatewayError::Timeout(Duration::from_secs(5)),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_backoff() {
        let (tx, rx) = watch::channel(false);
        let executor = RetryExecutor::new(rx);
        let mut policy = policy(5);
        policy.base_delay = Duration::from_secs(600);
        policy.max_delay = Duration::from_secs(600);

        let task = tokio::spawn(async move {
            executor
                .execute::<(), _, _>("read", &policy, || async {
                    Err(GatewayError::Transient("down".into()))
                })
                .await
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send_replace(true);

        let result = task.await.unwrap();
        assert!(result.as_ref().unwrap_err().is_cancelled());
        assert_eq!(result.unwrap_err().attempts(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_before_first_attempt() {
        let (_tx, rx) = watch::channel(true);
        let executor = RetryExecutor::new(rx);

        let result: Result<(), _> = executor
            .execute("read", &policy(5), || async { Ok(()) })
            .await;

        assert_eq!(
            result,
            Err(RetryError::Cancelled {
                attempts: 0,
                error: None
            })
        );
    }
}
