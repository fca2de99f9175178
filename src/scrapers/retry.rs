//! Bounded retries with jittered backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use super::pacing::Pacer;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }
}

/// Result of a single attempt, as classified by the operation.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Finished; stop retrying.
    Done(T),
    /// Failed in a way worth trying again.
    Retry(E),
    /// Failed in a way another attempt cannot fix.
    Terminal(E),
}

/// Why a retried operation gave up.
#[derive(Debug, Error)]
pub enum RetryError<E: Display> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("{0}")]
    Terminal(E),

    #[error("shutdown requested")]
    Cancelled,
}

/// Run `op` until it succeeds, fails terminally, or runs out of attempts.
///
/// `op` receives the 1-based attempt number. Between attempts the pacer
/// sleeps a jittered `policy.retry_delay`; no sleep follows the final
/// attempt, so callers decide their own give-up backoff.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    pacer: &Pacer,
    label: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        pacer.check().map_err(|_| RetryError::Cancelled)?;

        let error = match op(attempt).await {
            Attempt::Done(value) => return Ok(value),
            Attempt::Terminal(error) => return Err(RetryError::Terminal(error)),
            Attempt::Retry(error) => error,
        };

        warn!(
            attempt,
            max_attempts,
            "Attempt {}/{} for {} failed: {}",
            attempt, max_attempts, label, error
        );

        if attempt >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: error,
            });
        }

        pacer
            .pause(
                policy.retry_delay,
                &format!("before retry attempt {}", attempt + 1),
            )
            .await
            .map_err(|_| RetryError::Cancelled)?;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio_util::sync::CancellationToken;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_succeeds_after_retries() {
        let pacer = Pacer::seeded(1, CancellationToken::new());
        let calls = Cell::new(0);

        let result: Result<&str, RetryError<String>> =
            retry(&policy(3), &pacer, "page 1", |attempt| {
                calls.set(calls.get() + 1);
                async move {
                    if attempt < 3 {
                        Attempt::Retry(format!("HTTP 503 on attempt {}", attempt))
                    } else {
                        Attempt::Done("body")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "body");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let pacer = Pacer::seeded(1, CancellationToken::new());
        let calls = Cell::new(0);

        let result: Result<(), RetryError<String>> =
            retry(&policy(2), &pacer, "page 1", |_| {
                calls.set(calls.get() + 1);
                async { Attempt::Retry("timeout".to_string()) }
            })
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert_eq!(last, "timeout");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_terminal_stops_immediately() {
        let pacer = Pacer::seeded(1, CancellationToken::new());
        let calls = Cell::new(0);

        let result: Result<(), RetryError<String>> =
            retry(&policy(5), &pacer, "page 1", |_| {
                calls.set(calls.get() + 1);
                async { Attempt::Terminal("bad url".to_string()) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Terminal(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let pacer = Pacer::seeded(1, CancellationToken::new());
        let result: Result<u8, RetryError<String>> =
            retry(&RetryPolicy::new(0, Duration::ZERO), &pacer, "page 1", |_| async {
                Attempt::Done(1)
            })
            .await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let pacer = Pacer::seeded(1, token);

        let result: Result<u8, RetryError<String>> =
            retry(&policy(3), &pacer, "page 1", |_| async { Attempt::Done(1) }).await;
        assert!(matches!(result, Err(RetryError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_log_attempt_and_delay_fields() {
        let (logs, _guard) = crate::utils::log_capture::CapturedLogs::install();
        let pacer = Pacer::seeded(1, CancellationToken::new());

        let result: Result<(), RetryError<String>> = retry(
            &RetryPolicy::new(2, Duration::from_secs(5)),
            &pacer,
            "page 3",
            |_| async { Attempt::Retry("HTTP 503".to_string()) },
        )
        .await;
        assert!(matches!(result, Err(RetryError::Exhausted { .. })));

        let output = logs.contents();
        assert!(output.contains("attempt=1"), "{}", output);
        assert!(output.contains("attempt=2"), "{}", output);
        assert!(output.contains("max_attempts=2"), "{}", output);
        assert!(output.contains("delay_secs="), "{}", output);
    }
}
