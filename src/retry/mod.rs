//! Bounded, fixed-interval retries for eventually-consistent lookups.
//!
//! Every resolution step (task listing, attachment lookup, address lookup,
//! HTTP probing, remote execution) runs through [`retry`]. An attempt either
//! reports [`Readiness::Ready`] with a value or [`Readiness::NotReady`] with
//! a reason; not-ready attempts are always retried until the policy's
//! attempt budget is spent. There is no backoff and no jitter.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, warn};

/// Default attempt budget used by the lookup steps.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between lookup attempts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Attempt budget and fixed delay applied to a retried step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    /// Three attempts, thirty seconds apart.
    pub const LOOKUP: Self = Self {
        max_attempts: DEFAULT_MAX_ATTEMPTS,
        interval: DEFAULT_INTERVAL,
    };

    /// Builds a policy, rejecting a zero attempt budget.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRetryPolicy`] when `max_attempts` is zero.
    pub const fn new(max_attempts: u32, interval: Duration) -> Result<Self, InvalidRetryPolicy> {
        if max_attempts == 0 {
            return Err(InvalidRetryPolicy);
        }
        Ok(Self {
            max_attempts,
            interval,
        })
    }

    /// Builds a policy for a fixed preset; a zero budget becomes one attempt.
    #[must_use]
    pub const fn at_least_once(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            interval,
        }
    }

    /// A single attempt with no delay.
    #[must_use]
    pub const fn once() -> Self {
        Self {
            max_attempts: 1,
            interval: Duration::ZERO,
        }
    }

    /// Maximum number of attempts, always at least one.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept between consecutive attempts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::LOOKUP
    }
}

/// Raised when a retry policy is constructed with zero attempts.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("retry policy requires at least one attempt")]
pub struct InvalidRetryPolicy;

/// Outcome of a single attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Readiness<T, E> {
    /// The attempt produced its value; stop retrying.
    Ready(T),
    /// The resource is not observable yet; the reason is kept in case this
    /// turns out to be the final attempt.
    NotReady(E),
}

impl<T, E> From<Result<T, E>> for Readiness<T, E> {
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(ready) => Self::Ready(ready),
            Err(reason) => Self::NotReady(reason),
        }
    }
}

/// Pauses the caller between attempts.
pub trait Sleeper {
    /// Blocks for `duration`.
    fn sleep(&self, duration: Duration);
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Sleeper that blocks the current thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Raised when every attempt of a retried step came back not ready.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// The attempt budget was spent; `last` is the final attempt's reason.
    #[error("'{label}' unsuccessful after {attempts} attempts: {last}")]
    Exhausted {
        /// Label of the retried step.
        label: String,
        /// Number of attempts performed.
        attempts: u32,
        /// Reason reported by the final attempt.
        #[source]
        last: E,
    },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Reason reported by the final attempt.
    #[must_use]
    pub const fn last(&self) -> &E {
        match self {
            Self::Exhausted { last, .. } => last,
        }
    }

    /// Label of the step that was retried.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Exhausted { label, .. } => label,
        }
    }
}

/// Runs `operation` until it reports ready or the policy is exhausted.
///
/// The sleeper is invoked between attempts only, so a step that becomes
/// ready on attempt `k` sleeps `k - 1` times and an exhausted step sleeps
/// `max_attempts - 1` times.
///
/// # Errors
///
/// Returns [`RetryError::Exhausted`] carrying the final not-ready reason.
pub fn retry<T, E, F, S>(
    label: &str,
    policy: RetryPolicy,
    sleeper: &S,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Readiness<T, E>,
    E: std::error::Error + 'static,
    S: Sleeper + ?Sized,
{
    let mut attempt = 0_u32;
    loop {
        attempt += 1;
        match operation() {
            Readiness::Ready(value) => {
                debug!(operation = %label, attempt, "operation ready");
                return Ok(value);
            }
            Readiness::NotReady(reason) => {
                if attempt >= policy.max_attempts {
                    error!(
                        operation = %label,
                        attempt,
                        reason = %reason,
                        "operation not ready after final attempt"
                    );
                    return Err(RetryError::Exhausted {
                        label: label.to_owned(),
                        attempts: attempt,
                        last: reason,
                    });
                }
                warn!(
                    operation = %label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    reason = %reason,
                    delay_secs = policy.interval.as_secs(),
                    "operation not ready, retrying"
                );
                sleeper.sleep(policy.interval);
            }
        }
    }
}
