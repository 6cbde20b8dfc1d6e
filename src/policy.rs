//! Policies deciding whether a failed attempt is worth repeating.

use crate::error::BreakerError;

/// A policy that determines whether a retry executor should try again.
///
/// Any `Fn(&E, u32) -> bool + Send + Sync` closure is a policy.
///
/// ```rust
/// use faultguard_rs::RetryExecutor;
///
/// let retry = RetryExecutor::builder()
///     .policy(|err: &std::io::Error, _attempt: u32| {
///         err.kind() == std::io::ErrorKind::TimedOut
///     })
///     .build()
///     .unwrap();
/// # let _ = retry;
/// ```
pub trait RetryPolicy<E>: Send + Sync {
    /// Called after attempt number `attempt` (1-based) failed with `error`.
    ///
    /// The executor enforces `max_attempts` itself; policies only classify.
    fn should_retry(&self, error: &E, attempt: u32) -> bool;

    /// Called instead of [`should_retry`](Self::should_retry) when a guarded
    /// run was refused by an open breaker.
    fn retry_when_open(&self, _attempt: u32) -> bool {
        false
    }
}

/// Retries every operation failure; an open-circuit rejection in a guarded
/// run ends the run.
///
/// Retrying against an open breaker would only burn attempts and delays,
/// since the breaker keeps refusing until its timeout elapses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryPolicy;

impl<E> RetryPolicy<E> for DefaultRetryPolicy {
    fn should_retry(&self, _error: &E, _attempt: u32) -> bool {
        true
    }
}

/// Retries every failure, open-circuit rejections included.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryAll;

impl<E> RetryPolicy<E> for RetryAll {
    fn should_retry(&self, _error: &E, _attempt: u32) -> bool {
        true
    }

    fn retry_when_open(&self, _attempt: u32) -> bool {
        true
    }
}

impl<E, F> RetryPolicy<E> for F
where
    F: Fn(&E, u32) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &E, attempt: u32) -> bool {
        self(error, attempt)
    }
}

/// Lifts a policy over operation errors to the breaker's error type.
pub(crate) struct Guarded<'a, P>(pub(crate) &'a P);

impl<E, P> RetryPolicy<BreakerError<E>> for Guarded<'_, P>
where
    P: RetryPolicy<E>,
{
    fn should_retry(&self, error: &BreakerError<E>, attempt: u32) -> bool {
        match error {
            BreakerError::Open => <P as RetryPolicy<E>>::retry_when_open(self.0, attempt),
            BreakerError::Operation(inner) => self.0.should_retry(inner, attempt),
        }
    }
}
