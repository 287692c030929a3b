// retry.rs - Bounded exponential backoff for transient provider failures
use backoff::{future::retry_notify, ExponentialBackoff};
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Rate limited / temporarily unavailable
pub const RETRYABLE_STATUS_CODES: [u16; 2] = [429, 503];

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Failures that may carry an HTTP-like status code
pub trait StatusCoded {
    fn status_code(&self) -> Option<u16>;
}

pub fn is_retryable_status(status: Option<u16>) -> bool {
    status.map_or(false, |code| RETRYABLE_STATUS_CODES.contains(&code))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay slept after the given (1-based) failed attempt
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.delay_after_attempt(self.max_attempts),
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Run `operation`, retrying only 429/503 failures until the attempt ceiling.
    /// Non-retryable failures and the last attempt's failure are returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StatusCoded + Display,
    {
        let attempts = AtomicU32::new(0);
        let max_attempts = self.max_attempts;

        let attempt_once = || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let call = operation();
            async move {
                match call.await {
                    Ok(value) => Ok(value),
                    Err(err) if attempt < max_attempts && is_retryable_status(err.status_code()) => {
                        Err(backoff::Error::transient(err))
                    }
                    Err(err) => Err(backoff::Error::permanent(err)),
                }
            }
        };

        let on_retry = |err: E, delay: Duration| {
            tracing::warn!(
                operation = operation_name,
                attempt = attempts.load(Ordering::SeqCst),
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, retrying"
            );
        };

        retry_notify(self.schedule(), attempt_once, on_retry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct Failure(Option<u16>);

    impl Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "failure {:?}", self.0)
        }
    }

    impl StatusCoded for Failure {
        fn status_code(&self) -> Option<u16> {
            self.0
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[test]
    fn delays_double_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after_attempt(2), Duration::from_millis(2000));
        let total: Duration = (1..policy.max_attempts()).map(|a| policy.delay_after_attempt(a)).sum();
        assert_eq!(total, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let calls = AtomicUsize::new(0);
        let result: Result<&str, Failure> = fast_policy()
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Failure(Some(503)))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_failure_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), Failure> = fast_policy()
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure(Some(400))) }
            })
            .await;
        assert_eq!(result.unwrap_err().0, Some(400));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_status_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), Failure> = fast_policy()
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure(None)) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_attempt_ceiling() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), Failure> = fast_policy()
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure(Some(429))) }
            })
            .await;
        assert_eq!(result.unwrap_err().0, Some(429));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
