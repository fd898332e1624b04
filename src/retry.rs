use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Waits `attempt * step` after the given failed attempt.
    Linear(Duration),
    Fixed(Duration),
}

/// Sequential retry with a bounded attempt count. No jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub retryable: fn(&ApiError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(2, Duration::from_millis(1000))
    }
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear(step),
            retryable: is_retryable,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Fixed(Duration::ZERO),
            retryable: is_retryable,
        }
    }

    /// Delay after the 1-based `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Linear(step) => step * attempt,
            Backoff::Fixed(delay) => delay,
        }
    }

    pub async fn run<F, Fut, T>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{operation_name} succeeded on attempt {attempt}/{max_attempts}");
                    }
                    return Ok(value);
                }
                Err(err) if attempt >= max_attempts || !(self.retryable)(&err) => {
                    warn!("{operation_name} gave up after attempt {attempt}/{max_attempts}: {err}");
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{operation_name} failed on attempt {attempt}/{max_attempts} ({err}), \
                         retrying in {delay:?}"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Every request failure is worth another attempt; cancellation and empty data are not.
pub fn is_retryable(err: &ApiError) -> bool {
    !matches!(err, ApiError::Cancelled | ApiError::NoData(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[test]
    fn linear_backoff_grows_with_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0);
        let started = Instant::now();

        let result: Result<(), ApiError> = policy
            .run("search", || {
                calls.set(calls.get() + 1);
                async {
                    Err(ApiError::Http {
                        status: 503,
                        url: "https://example.test".into(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(ApiError::Http { status: 503, .. })));
        assert_eq!(calls.get(), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn second_attempt_can_succeed() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0);

        let result = policy
            .run("trending", || {
                calls.set(calls.get() + 1);
                let attempt = calls.get();
                async move {
                    if attempt == 1 {
                        Err(ApiError::Network("connection reset".into()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn non_retryable_errors_return_immediately() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0);

        let result: Result<(), ApiError> = policy
            .run("embed", || {
                calls.set(calls.get() + 1);
                async { Err(ApiError::Cancelled) }
            })
            .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls.get(), 1);
    }
}
