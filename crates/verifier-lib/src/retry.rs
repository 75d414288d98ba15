//! Bounded retry with a fixed interval
//!
//! The sleep between attempts goes through [`Sleeper`] so the combinator
//! can be driven by a fake clock in tests. Reaching `max_attempts` without
//! a success is the only exhaustion condition.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

pub use async_trait::async_trait;

/// How many times to try and how long to wait before each try
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Upper bound on time spent sleeping across all attempts
    pub fn max_wait(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 180,
            interval: Duration::from_secs(5),
        }
    }
}

/// Suspends the calling task
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] on the tokio timer; yields to other tasks while waiting
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Every attempt failed
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: Option<E>,
}

/// Successful attempt and how many tries it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Run `op` up to `policy.max_attempts` times, sleeping `policy.interval`
/// before each attempt. Returns on the first `Ok`.
pub async fn retry_bounded<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut op: F,
) -> Result<Attempted<T>, RetryExhausted<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        sleeper.sleep(policy.interval).await;

        match op(attempt).await {
            Ok(value) => return Ok(Attempted { value, attempts: attempt }),
            Err(e) => {
                debug!(
                    attempt = attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Attempt failed"
                );
                last_error = Some(e);
            }
        }
    }

    Err(RetryExhausted {
        attempts: policy.max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSleeper;

    #[tokio::test]
    async fn test_returns_on_first_success() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(5, Duration::from_secs(2));

        let result = retry_bounded(&policy, &sleeper, |attempt| async move {
            if attempt >= 3 {
                Ok(attempt * 10)
            } else {
                Err(format!("not yet ({attempt})"))
            }
        })
        .await
        .unwrap();

        assert_eq!(result.value, 30);
        assert_eq!(result.attempts, 3);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(2); 3]);
    }

    #[tokio::test]
    async fn test_exhausts_at_exactly_max_attempts() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(4, Duration::from_millis(500));
        let mut calls = 0;

        let err = retry_bounded(&policy, &sleeper, |attempt| {
            calls += 1;
            async move { Err::<(), _>(format!("fail {attempt}")) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls, 4);
        assert_eq!(err.attempts, 4);
        assert_eq!(err.last_error.as_deref(), Some("fail 4"));
        assert_eq!(sleeper.total(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_zero_attempts_never_calls_op() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        let mut calls = 0;

        let err = retry_bounded(&policy, &sleeper, |_| {
            calls += 1;
            async { Err::<(), _>("unused".to_string()) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls, 0);
        assert_eq!(err.attempts, 0);
        assert!(err.last_error.is_none());
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn test_default_policy_bounds_wall_clock() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 180);
        assert_eq!(policy.max_wait(), Duration::from_secs(900));
    }

    #[test]
    fn test_tokio_sleeper_yields() {
        tokio_test::block_on(async {
            let start = tokio::time::Instant::now();
            TokioSleeper.sleep(Duration::from_millis(10)).await;
            assert!(start.elapsed() >= Duration::from_millis(10));
        });
    }
}
