//! Fixed-delay retry policy.
//!
//! Each call to [`RetryPolicy::run`] owns its own attempt counter and walks
//! an explicit state machine:
//!
//! ```text
//! Pending -> Success
//! Pending -> Retrying -> Pending
//! Pending -> Exhausted
//! ```
//!
//! `Retrying` is only entered from a failed `Pending` attempt while attempts
//! remain and the error is retryable. `Success` and `Exhausted` are terminal.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::trace;

/// Decides whether a failed attempt is worth repeating.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Retry settings shared by every endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(1000),
        }
    }
}

/// State of one retry sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Pending { attempt: u32 },
    Retrying { attempt: u32 },
    Success { attempts: u32 },
    Exhausted { attempts: u32 },
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Success { .. } | AttemptState::Exhausted { .. }
        )
    }
}

/// Terminal outcome of a retry sequence.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// The successful value, or the error from the last attempt.
    pub result: Result<T, E>,
    /// Attempts actually made.
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Computes the next state after an attempt finished.
    pub fn advance(&self, attempt: u32, succeeded: bool, retryable: bool) -> AttemptState {
        if succeeded {
            AttemptState::Success { attempts: attempt }
        } else if retryable && attempt < self.max_attempts {
            AttemptState::Retrying { attempt }
        } else {
            AttemptState::Exhausted { attempts: attempt }
        }
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut state = AttemptState::Pending { attempt: 1 };
        let mut last = None;

        loop {
            match state {
                AttemptState::Pending { attempt } => {
                    let result = op(attempt).await;
                    let next = match &result {
                        Ok(_) => self.advance(attempt, true, false),
                        Err(e) => self.advance(attempt, false, e.is_retryable()),
                    };
                    trace!(attempt, ?next, "attempt finished");
                    last = Some(result);
                    state = next;
                }
                AttemptState::Retrying { attempt } => {
                    if let Some(Err(ref e)) = last {
                        trace!(attempt, error = %e, delay = ?self.delay, "retrying");
                    }
                    tokio::time::sleep(self.delay).await;
                    state = AttemptState::Pending {
                        attempt: attempt + 1,
                    };
                }
                AttemptState::Success { attempts } | AttemptState::Exhausted { attempts } => {
                    // Pending always stores a result before reaching a terminal state
                    let result = match last {
                        Some(result) => result,
                        None => unreachable!("terminal state without an attempt"),
                    };
                    return RetryOutcome { result, attempts };
                }
            }
        }
    }
}
