//! Fixed-interval retry executor.

use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::breaker::CircuitBreaker;
use crate::cancel::CancelToken;
use crate::clock::{saturating_millis, Clock};
use crate::config::RetryBuilder;
use crate::error::{BreakerError, ConfigError, RetryError, RetryResult};
use crate::metrics::MetricSink;
use crate::policy::{DefaultRetryPolicy, Guarded, RetryPolicy};

/// Outcome of a single attempt inside one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Whether the attempt succeeded.
    pub succeeded: bool,
    /// Delay waited after this attempt; zero when no retry followed.
    pub delay_after: Duration,
}

/// Summary of one run, returned by [`RetryExecutor::run_with_report`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    /// Attempts made.
    pub attempts: u32,
    /// Sum of all delays waited.
    pub total_delay: Duration,
    /// Per-attempt outcomes in order.
    pub history: SmallVec<[AttemptRecord; 4]>,
}

impl RetryReport {
    fn record(&mut self, attempt: u32, succeeded: bool, delay_after: Duration) {
        self.attempts = attempt;
        self.total_delay += delay_after;
        self.history.push(AttemptRecord {
            attempt,
            succeeded,
            delay_after,
        });
    }
}

enum Step<E> {
    Retry(E),
    Stop(RetryError<E>),
}

/// Runs an operation up to `max_attempts` times with a fixed delay between attempts.
///
/// Holds no per-run state, so one executor can serve any number of
/// concurrent runs.
///
/// ```rust
/// use faultguard_rs::{ManualClock, RetryExecutor};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let retry = RetryExecutor::builder()
///     .max_attempts(3)
///     .delay(Duration::from_secs(1))
///     .clock(clock.clone())
///     .build()
///     .unwrap();
///
/// let mut calls = 0;
/// let value = retry.run(|| {
///     calls += 1;
///     if calls < 3 { Err("flaky") } else { Ok(calls) }
/// });
///
/// assert_eq!(value, Ok(3));
/// assert_eq!(clock.sleep_count(), 2);
/// ```
pub struct RetryExecutor<P = DefaultRetryPolicy> {
    max_attempts: u32,
    delay: Duration,
    policy: P,
    clock: Arc<dyn Clock>,
    metric_sink: Arc<dyn MetricSink>,
}

impl RetryExecutor<DefaultRetryPolicy> {
    /// Creates an executor with the default policy.
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, ConfigError> {
        Self::builder().max_attempts(max_attempts).delay(delay).build()
    }

    /// Creates a new builder for customizing a retry executor.
    pub fn builder() -> RetryBuilder<DefaultRetryPolicy> {
        RetryBuilder::new()
    }
}

impl<P> RetryExecutor<P> {
    pub(crate) fn from_parts(
        max_attempts: u32,
        delay: Duration,
        policy: P,
        clock: Arc<dyn Clock>,
        metric_sink: Arc<dyn MetricSink>,
    ) -> Self {
        Self {
            max_attempts,
            delay,
            policy,
            clock,
            metric_sink,
        }
    }

    /// Total attempts per run, first attempt included.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// The retry policy in use.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Runs `operation` until it succeeds, the policy refuses a retry, or
    /// `max_attempts` attempts have failed.
    pub fn run<F, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        F: FnMut() -> Result<T, E>,
        P: RetryPolicy<E>,
    {
        self.run_inner(&self.policy, operation, None).0
    }

    /// Like [`run`](Self::run), but stops before any attempt once `cancel` fires.
    pub fn run_with_cancel<F, T, E>(&self, cancel: &CancelToken, operation: F) -> RetryResult<T, E>
    where
        F: FnMut() -> Result<T, E>,
        P: RetryPolicy<E>,
    {
        self.run_inner(&self.policy, operation, Some(cancel)).0
    }

    /// Like [`run`](Self::run), also returning what each attempt did.
    pub fn run_with_report<F, T, E>(&self, operation: F) -> (RetryResult<T, E>, RetryReport)
    where
        F: FnMut() -> Result<T, E>,
        P: RetryPolicy<E>,
    {
        self.run_inner(&self.policy, operation, None)
    }

    /// Runs `operation` through `breaker` on every attempt.
    ///
    /// The policy sees the operation's own errors. An open-circuit rejection
    /// ends the run unless the policy's
    /// [`retry_when_open`](RetryPolicy::retry_when_open) says otherwise.
    pub fn run_guarded<F, T, E>(
        &self,
        breaker: &CircuitBreaker,
        mut operation: F,
    ) -> RetryResult<T, BreakerError<E>>
    where
        F: FnMut() -> Result<T, E>,
        P: RetryPolicy<E>,
    {
        let policy = Guarded(&self.policy);
        self.run_inner(&policy, || breaker.call(&mut operation), None).0
    }

    fn run_inner<Q, F, T, E>(
        &self,
        policy: &Q,
        mut operation: F,
        cancel: Option<&CancelToken>,
    ) -> (RetryResult<T, E>, RetryReport)
    where
        F: FnMut() -> Result<T, E>,
        Q: RetryPolicy<E>,
    {
        let mut report = RetryReport::default();
        let mut last = None;
        let mut attempt = 0;

        loop {
            if let Some(stop) = self.check_cancelled(cancel, attempt, &mut last) {
                return (Err(stop), report);
            }

            attempt += 1;
            debug!(attempt, max_attempts = self.max_attempts, "executing attempt");

            match operation() {
                Ok(value) => {
                    report.record(attempt, true, Duration::ZERO);
                    return (Ok(value), report);
                }
                Err(error) => match self.assess(policy, error, attempt, &mut report) {
                    Step::Retry(error) => {
                        last = Some(error);
                        self.clock.sleep(self.delay);
                    }
                    Step::Stop(stop) => return (Err(stop), report),
                },
            }
        }
    }

    fn check_cancelled<E>(
        &self,
        cancel: Option<&CancelToken>,
        attempts: u32,
        last: &mut Option<E>,
    ) -> Option<RetryError<E>> {
        match cancel {
            Some(token) if token.is_cancelled() => {
                debug!(attempts, "retry run cancelled");
                Some(RetryError::Cancelled {
                    attempts,
                    last: last.take(),
                })
            }
            _ => None,
        }
    }

    fn assess<Q, E>(
        &self,
        policy: &Q,
        error: E,
        attempt: u32,
        report: &mut RetryReport,
    ) -> Step<E>
    where
        Q: RetryPolicy<E>,
    {
        if !policy.should_retry(&error, attempt) {
            debug!(attempt, "failure is not retryable, giving up");
            report.record(attempt, false, Duration::ZERO);
            return Step::Stop(RetryError::Aborted {
                attempts: attempt,
                error,
            });
        }

        if attempt >= self.max_attempts {
            warn!(attempts = attempt, "retries exhausted");
            report.record(attempt, false, Duration::ZERO);
            return Step::Stop(RetryError::Exhausted {
                attempts: attempt,
                last: error,
            });
        }

        debug!(
            attempt,
            delay_ms = saturating_millis(self.delay),
            "attempt failed, retrying after delay"
        );
        self.metric_sink.record_retry(attempt + 1, self.delay);
        report.record(attempt, false, self.delay);
        Step::Retry(error)
    }
}

#[cfg(feature = "async")]
impl<P> RetryExecutor<P> {
    /// Async version of [`run`](Self::run); delays suspend instead of blocking.
    pub async fn run_async<F, Fut, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        P: RetryPolicy<E>,
    {
        self.run_async_inner(&self.policy, operation, None).await.0
    }

    /// Async version of [`run_with_cancel`](Self::run_with_cancel).
    ///
    /// Cancellation also cuts short a delay in progress.
    pub async fn run_async_with_cancel<F, Fut, T, E>(
        &self,
        cancel: &CancelToken,
        operation: F,
    ) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        P: RetryPolicy<E>,
    {
        self.run_async_inner(&self.policy, operation, Some(cancel)).await.0
    }

    /// Async version of [`run_guarded`](Self::run_guarded).
    ///
    /// `operation` is only called once the breaker has admitted the attempt.
    pub async fn run_guarded_async<F, Fut, T, E>(
        &self,
        breaker: &CircuitBreaker,
        mut operation: F,
    ) -> RetryResult<T, BreakerError<E>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        P: RetryPolicy<E>,
    {
        let policy = Guarded(&self.policy);
        let attempt = move || {
            let admitted = breaker
                .try_acquire::<E>()
                .map(|permit| (permit, operation()));
            async move {
                match admitted {
                    Ok((permit, pending)) => permit.run_async(pending).await,
                    Err(rejected) => Err(rejected),
                }
            }
        };
        self.run_async_inner(&policy, attempt, None).await.0
    }

    async fn run_async_inner<Q, F, Fut, T, E>(
        &self,
        policy: &Q,
        mut operation: F,
        cancel: Option<&CancelToken>,
    ) -> (RetryResult<T, E>, RetryReport)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        Q: RetryPolicy<E>,
    {
        let mut report = RetryReport::default();
        let mut last = None;
        let mut attempt = 0;

        loop {
            if let Some(stop) = self.check_cancelled(cancel, attempt, &mut last) {
                return (Err(stop), report);
            }

            attempt += 1;
            debug!(attempt, max_attempts = self.max_attempts, "executing attempt");

            match operation().await {
                Ok(value) => {
                    report.record(attempt, true, Duration::ZERO);
                    return (Ok(value), report);
                }
                Err(error) => match self.assess(policy, error, attempt, &mut report) {
                    Step::Retry(error) => {
                        last = Some(error);
                        match cancel {
                            Some(token) => {
                                tokio::select! {
                                    _ = self.clock.sleep_async(self.delay) => {}
                                    _ = token.cancelled() => {}
                                }
                            }
                            None => self.clock.sleep_async(self.delay).await,
                        }
                    }
                    Step::Stop(stop) => return (Err(stop), report),
                },
            }
        }
    }
}

impl<P: Clone> Clone for RetryExecutor<P> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            delay: self.delay,
            policy: self.policy.clone(),
            clock: Arc::clone(&self.clock),
            metric_sink: Arc::clone(&self.metric_sink),
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for RetryExecutor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
