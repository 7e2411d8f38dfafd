/// Retry policy with quadratic backoff for transient storage conflicts
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::cancel::CancelSignal;

/// Message fragments emitted by PostgreSQL (and most poolers in front of it)
/// when a transaction lost a race against a concurrent one.
const TRANSIENT_MARKERS: &[&str] = &[
    "deadlock detected",
    "could not serialize access",
    "canceling statement due to conflict",
    "timeout",
];

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Backoff after attempt `n` (0-based) is `n² × backoff_unit`
    pub backoff_unit: Duration,
    /// Upper bound for a single backoff
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_unit: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (0-based).
    ///
    /// With the defaults this yields 0ms, 100ms, 400ms, 900ms, 1600ms.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = attempt.saturating_mul(attempt);
        self.backoff_unit
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Classification seam: tells the coordinator whether a failure is worth
/// another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for String {
    fn is_retryable(&self) -> bool {
        is_transient_message(self)
    }
}

impl Retryable for &str {
    fn is_retryable(&self) -> bool {
        is_transient_message(self)
    }
}

/// Returns true when an engine error message signals lock contention,
/// serialization failure, a conflict-cancelled statement or a timeout.
pub fn is_transient_message(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    TRANSIENT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E>
where
    E: fmt::Display + fmt::Debug,
{
    #[error("{operation}: {cause}")]
    Permanent {
        operation: String,
        /// Attempt (1-based) that produced the non-retryable failure
        attempts: u32,
        cause: E,
    },
    #[error("{operation}: failed after {attempts} attempts, last error: {last}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last: E,
    },
    #[error("{operation}: cancelled")]
    Cancelled { operation: String },
}

impl<E> RetryError<E>
where
    E: fmt::Display + fmt::Debug,
{
    pub fn operation(&self) -> &str {
        match self {
            RetryError::Permanent { operation, .. }
            | RetryError::Exhausted { operation, .. }
            | RetryError::Cancelled { operation } => operation,
        }
    }
}

/// Execute `f` until it succeeds, fails permanently, runs out of attempts or
/// `cancel` fires.
///
/// Cancellation is observed before every attempt and while sleeping between
/// attempts; an attempt that is already running is allowed to finish.
pub async fn with_retry<F, Fut, T, E>(
    operation: &str,
    config: &RetryConfig,
    cancel: &CancelSignal,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display + fmt::Debug,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled {
                operation: operation.to_string(),
            });
        }

        let err = match f().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Err(RetryError::Permanent {
                operation: operation.to_string(),
                attempts: attempt + 1,
                cause: err,
            });
        }

        if attempt + 1 >= max_attempts {
            error!(
                operation,
                attempts = max_attempts,
                error = %err,
                "Retries exhausted"
            );
            return Err(RetryError::Exhausted {
                operation: operation.to_string(),
                attempts: max_attempts,
                last: err,
            });
        }

        let delay = config.backoff_for(attempt);
        warn!(
            operation,
            attempt = attempt + 1,
            max_attempts,
            backoff_ms = delay.as_millis() as u64,
            error = %err,
            "Transient storage conflict, retrying"
        );

        let mut cancel = cancel.clone();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                return Err(RetryError::Cancelled {
                    operation: operation.to_string(),
                });
            }
        }

        attempt += 1;
    }
}
