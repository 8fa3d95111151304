//! Retrying call abstraction
//!
//! One reusable retry loop shared by every upstream caller, parameterised by the
//! retryable status set and a fixed backoff schedule.
//!
//! **Algorithm:**
//! 1. Run attempt `n` (1-based), racing it against the cancellation token
//! 2. `Done` returns immediately, `Abort` fails immediately without retrying
//! 3. `Retry` records the failure; unless `n` was the final attempt, sleep
//!    `delays_ms[n - 1]` plus uniform jitter in `[0, jitter_ms)`, again racing
//!    the cancellation token, then continue
//! 4. When attempts run out, fail with the last recorded failure
//!
//! Attempts are strictly sequential: each one, including its backoff sleep,
//! resolves before the next begins.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Statuses signalling transient upstream conditions
pub const RETRYABLE_STATUSES: [u16; 8] = [408, 409, 425, 429, 500, 502, 503, 504];

/// Attempt cap
pub const MAX_ATTEMPTS: u32 = 3;

/// Base delay after attempt 1, 2 and 3. The third value only applies if the
/// attempt cap is raised above 3.
pub const BACKOFF_SCHEDULE_MS: [u64; 3] = [400, 900, 1500];

/// Upper bound (exclusive) of the random jitter added to each delay
pub const JITTER_MS: u64 = 200;

/// Retry settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delays_ms: Vec<u64>,
    pub jitter_ms: u64,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delays_ms: BACKOFF_SCHEDULE_MS.to_vec(),
            jitter_ms: JITTER_MS,
            retryable_statuses: RETRYABLE_STATUSES.to_vec(),
        }
    }
}

/// Result of one attempt, as judged by the caller
#[derive(Debug)]
pub enum AttemptOutcome<T, E, D> {
    /// Success, stop
    Done(T),
    /// Transient failure, retry if attempts remain
    Retry(D),
    /// Permanent failure, stop without retrying
    Abort(E),
}

/// Successful value plus the number of attempts it took
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Why the retry loop gave up
#[derive(Debug)]
pub enum RetryError<E, D> {
    /// Every attempt returned `Retry`
    Exhausted { attempts: u32, last_failure: Option<D> },
    /// An attempt returned `Abort`
    Aborted { attempts: u32, error: E },
    /// The cancellation token fired before the loop resolved
    Cancelled { attempts: u32 },
}

impl RetryPolicy {
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Base delay after the given (1-based) attempt; the last schedule entry repeats
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let index = (attempt.max(1) - 1) as usize;
        let ms = self
            .delays_ms
            .get(index)
            .or_else(|| self.delays_ms.last())
            .copied()
            .unwrap_or(0);
        Duration::from_millis(ms)
    }

    fn jitter(&self) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..self.jitter_ms))
    }

    /// Drive `operation` through the retry loop
    pub async fn run<T, E, D, F, Fut>(
        &self,
        operation_name: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<Retried<T>, RetryError<E, D>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptOutcome<T, E, D>>,
        D: std::fmt::Debug,
    {
        let mut last_failure = None;
        let mut attempts = 0;

        while attempts < self.max_attempts {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled { attempts });
            }
            attempts += 1;

            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(operation = operation_name, attempt = attempts, "Cancelled during attempt");
                    return Err(RetryError::Cancelled { attempts });
                }
                outcome = operation(attempts) => outcome,
            };

            match outcome {
                AttemptOutcome::Done(value) => {
                    if attempts > 1 {
                        tracing::info!(
                            operation = operation_name,
                            attempts,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(Retried { value, attempts });
                }
                AttemptOutcome::Abort(error) => {
                    return Err(RetryError::Aborted { attempts, error });
                }
                AttemptOutcome::Retry(failure) => {
                    if attempts >= self.max_attempts {
                        tracing::error!(
                            operation = operation_name,
                            attempts,
                            failure = ?failure,
                            "Retry attempts exhausted"
                        );
                        last_failure = Some(failure);
                        break;
                    }

                    let delay = self.base_delay(attempts) + self.jitter();
                    tracing::warn!(
                        operation = operation_name,
                        attempt = attempts,
                        backoff_ms = delay.as_millis() as u64,
                        failure = ?failure,
                        "Transient failure, will retry after backoff"
                    );
                    last_failure = Some(failure);

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::info!(operation = operation_name, attempt = attempts, "Cancelled during backoff");
                            return Err(RetryError::Cancelled { attempts });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        Err(RetryError::Exhausted {
            attempts,
            last_failure,
        })
    }
}
