//! Core circuit breaker implementation.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::clock::{saturating_millis, Clock};
use crate::config::BreakerBuilder;
use crate::error::{BreakerError, BreakerResult, ConfigError};
use crate::hook::HookRegistry;
use crate::metrics::MetricSink;
use crate::state::{Admission, BreakerCore, BreakerSnapshot, Permit, State, Transition};

/// Inner state of the circuit breaker, shared between clones.
struct BreakerInner {
    core: Mutex<BreakerCore>,
    name: Option<Arc<str>>,
    failure_threshold: u32,
    open_timeout: Duration,
    clock: Arc<dyn Clock>,
    metric_sink: Arc<dyn MetricSink>,
    hooks: Arc<HookRegistry>,
}

/// A circuit breaker that can wrap function calls to prevent cascading failures.
///
/// Construct one per protected resource and share it: clones are cheap and
/// all observe and mutate the same health record.
///
/// ```rust
/// use faultguard_rs::{BreakerError, CircuitBreaker, State};
/// use std::time::Duration;
///
/// let breaker = CircuitBreaker::new(2, Duration::from_secs(10)).unwrap();
///
/// for _ in 0..2 {
///     let result = breaker.call(|| Err::<(), _>("refused"));
///     assert_eq!(result, Err(BreakerError::Operation("refused")));
/// }
///
/// assert_eq!(breaker.current_state(), State::Open);
/// assert_eq!(breaker.call(|| Ok::<_, &str>(1)), Err(BreakerError::Open));
/// ```
pub struct CircuitBreaker {
    inner: Arc<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a breaker that opens after `failure_threshold` consecutive
    /// failures and stays open for `open_timeout`.
    pub fn new(failure_threshold: u32, open_timeout: Duration) -> Result<Self, ConfigError> {
        Self::builder()
            .failure_threshold(failure_threshold)
            .open_timeout(open_timeout)
            .build()
    }

    /// Creates a new builder for customizing a circuit breaker.
    pub fn builder() -> BreakerBuilder {
        BreakerBuilder::new()
    }

    pub(crate) fn from_builder(builder: BreakerBuilder) -> Self {
        let inner = BreakerInner {
            core: Mutex::new(BreakerCore::new()),
            name: builder.name,
            failure_threshold: builder.failure_threshold,
            open_timeout: builder.open_timeout,
            clock: builder.clock,
            metric_sink: builder.metric_sink,
            hooks: builder.hook_registry,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// The resource name given at construction, if any.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Consecutive failures needed to trip the breaker.
    pub fn failure_threshold(&self) -> u32 {
        self.inner.failure_threshold
    }

    /// Time spent open before a trial call is allowed.
    pub fn open_timeout(&self) -> Duration {
        self.inner.open_timeout
    }

    /// Gets the current state of the circuit breaker.
    pub fn current_state(&self) -> State {
        self.inner.core.lock().state()
    }

    /// Gets the current consecutive failure count.
    pub fn failure_count(&self) -> u32 {
        self.inner.core.lock().snapshot().failure_count
    }

    /// Reads state, failure count and last failure time atomically.
    pub fn snapshot(&self) -> BreakerSnapshot {
        self.inner.core.lock().snapshot()
    }

    /// Executes a function wrapped by the circuit breaker.
    ///
    /// Runs `f` at most once. While the circuit is open and the timeout has
    /// not elapsed, `f` is not run and [`BreakerError::Open`] is returned.
    pub fn call<F, T, E>(&self, f: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let guard = self.try_acquire::<E>()?;

        let start = self.inner.clock.now();
        let result = f();
        guard.settle(result.is_ok(), start);

        result.map_err(BreakerError::Operation)
    }

    /// Forces the circuit breaker to the open state.
    ///
    /// Returns false if it was already open.
    pub fn force_open(&self) -> bool {
        let now = self.inner.clock.now();
        let transition = self.inner.core.lock().force_open(now);

        match transition {
            Some(transition) => {
                self.announce(transition);
                true
            }
            None => false,
        }
    }

    /// Forces the circuit breaker to the closed state and clears the failure count.
    ///
    /// Returns false if it was already closed.
    pub fn force_closed(&self) -> bool {
        let transition = self.inner.core.lock().force_closed();

        match transition {
            Some(transition) => {
                self.announce(transition);
                true
            }
            None => false,
        }
    }

    fn label(&self) -> &str {
        self.inner.name.as_deref().unwrap_or("unnamed")
    }

    /// Asks for permission to run one operation.
    ///
    /// The returned guard must be settled once the operation has finished.
    pub(crate) fn try_acquire<E>(&self) -> Result<PermitGuard<'_>, BreakerError<E>> {
        let now = self.inner.clock.now();
        let (admission, transition) = self.inner.core.lock().admit(now, self.inner.open_timeout);

        if let Some(transition) = transition {
            self.announce(transition);
        }

        match admission {
            Admission::Allowed(permit) => Ok(PermitGuard {
                breaker: self,
                permit,
                settled: false,
            }),
            Admission::Rejected => {
                trace!(breaker = self.label(), "call rejected, circuit open");
                self.inner.metric_sink.record_rejection();
                self.inner.hooks.execute_rejected_hook();
                Err(BreakerError::Open)
            }
        }
    }

    fn update(&self, permit: Permit, success: bool, now: Instant) -> (Option<Transition>, u32) {
        let mut core = self.inner.core.lock();
        let transition = if success {
            core.on_success(permit)
        } else {
            core.on_failure(permit, now, self.inner.failure_threshold)
        };
        (transition, core.snapshot().failure_count)
    }

    fn record(&self, permit: Permit, success: bool, started: Instant) {
        let now = self.inner.clock.now();
        let (transition, failure_count) = self.update(permit, success, now);

        self.inner
            .metric_sink
            .record_call(success, now.saturating_duration_since(started));

        if success {
            self.inner.hooks.execute_success_hook();
        } else {
            debug!(
                breaker = self.label(),
                failure_count,
                failure_threshold = self.inner.failure_threshold,
                "guarded operation failed"
            );
            self.inner.hooks.execute_failure_hook();
        }

        if let Some(transition) = transition {
            self.announce(transition);
        }
    }

    fn announce(&self, transition: Transition) {
        if transition.to == State::Open {
            warn!(
                breaker = self.label(),
                from = transition.from.as_str(),
                open_timeout_ms = saturating_millis(self.inner.open_timeout),
                "circuit opened"
            );
        } else {
            debug!(
                breaker = self.label(),
                from = transition.from.as_str(),
                to = transition.to.as_str(),
                "circuit state changed"
            );
        }

        self.inner
            .metric_sink
            .record_state_transition(transition.from, transition.to);
        self.inner.hooks.execute_state_transition_hook(transition.to);
    }
}

/// Outstanding permission to run one operation.
///
/// Dropping it unsettled (the operation panicked, or its future was dropped)
/// counts as a failure, so a half-open trial can never be leaked.
pub(crate) struct PermitGuard<'a> {
    breaker: &'a CircuitBreaker,
    permit: Permit,
    settled: bool,
}

impl PermitGuard<'_> {
    fn settle(mut self, success: bool, started: Instant) {
        self.settled = true;
        self.breaker.record(self.permit, success, started);
    }
}

#[cfg(feature = "async")]
impl PermitGuard<'_> {
    /// Awaits an operation admitted by this permit and settles it.
    pub(crate) async fn run_async<Fut, T, E>(self, pending: Fut) -> BreakerResult<T, E>
    where
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let start = self.breaker.inner.clock.now();
        let result = pending.await;
        self.settle(result.is_ok(), start);

        result.map_err(BreakerError::Operation)
    }
}

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let breaker = self.breaker;
        let now = breaker.inner.clock.now();
        if std::thread::panicking() {
            // user hooks and sinks must not run during unwinding
            let (transition, failure_count) = breaker.update(self.permit, false, now);
            warn!(
                breaker = breaker.label(),
                failure_count,
                state = ?transition.map(|t| t.to),
                "guarded operation panicked"
            );
        } else {
            breaker.record(self.permit, false, now);
        }
    }
}

// Allow cloning of circuit breakers - cheap because inner state is Arc'd
impl Clone for CircuitBreaker {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("failure_threshold", &self.inner.failure_threshold)
            .field("open_timeout", &self.inner.open_timeout)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

// Implement Async support when the feature is enabled
#[cfg(feature = "async")]
impl CircuitBreaker {
    /// Executes an async function wrapped by the circuit breaker.
    ///
    /// The breaker lock is never held across the await point.
    pub async fn call_async<F, Fut, T, E>(&self, f: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let guard = self.try_acquire::<E>()?;
        guard.run_async(f()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::cell::Cell;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn breaker(threshold: u32, clock: &ManualClock) -> CircuitBreaker {
        CircuitBreaker::builder()
            .failure_threshold(threshold)
            .open_timeout(Duration::from_secs(10))
            .clock(clock.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn tripping_call_returns_the_operation_error() {
        let clock = ManualClock::new();
        let breaker = breaker(1, &clock);

        let result = breaker.call(|| Err::<(), _>("boom"));
        assert_eq!(result, Err(BreakerError::Operation("boom")));
        assert_eq!(breaker.current_state(), State::Open);
    }

    #[test]
    fn open_breaker_does_not_invoke_operation() {
        let clock = ManualClock::new();
        let breaker = breaker(1, &clock);
        let _ = breaker.call(|| Err::<(), _>("boom"));

        let invoked = Cell::new(false);
        let result = breaker.call(|| {
            invoked.set(true);
            Ok::<_, &str>(())
        });

        assert_eq!(result, Err(BreakerError::Open));
        assert!(!invoked.get());
    }

    #[test]
    fn failure_time_tracks_clock() {
        let clock = ManualClock::new();
        let breaker = breaker(3, &clock);

        clock.advance(Duration::from_secs(2));
        let _ = breaker.call(|| Err::<(), _>("boom"));
        let snap = breaker.snapshot();
        assert_eq!(snap.failure_count, 1);
        assert_eq!(snap.last_failure_time, Some(clock.now()));
    }

    #[test]
    fn panicking_trial_reopens_the_circuit() {
        let clock = ManualClock::new();
        let breaker = breaker(1, &clock);
        let _ = breaker.call(|| Err::<(), _>("boom"));
        clock.advance(Duration::from_secs(10));

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = breaker.call(|| -> Result<(), &str> { panic!("trial blew up") });
        }));
        assert!(outcome.is_err());
        assert_eq!(breaker.current_state(), State::Open);

        clock.advance(Duration::from_secs(10));
        assert_eq!(breaker.call(|| Ok::<_, &str>(5)), Ok(5));
        assert_eq!(breaker.current_state(), State::Closed);
    }

    #[test]
    fn panicking_operation_skips_hooks_but_records_failure() {
        let clock = ManualClock::new();
        let failures = Arc::new(AtomicUsize::new(0));
        let hooks = HookRegistry::new();
        let seen = Arc::clone(&failures);
        hooks.set_on_failure(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        hooks.set_on_open(|| panic!("open hook ran while unwinding"));

        let breaker = CircuitBreaker::builder()
            .failure_threshold(1)
            .clock(clock.clone())
            .hooks(hooks)
            .build()
            .unwrap();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = breaker.call(|| -> Result<(), &str> { panic!("operation blew up") });
        }));

        assert!(outcome.is_err());
        assert_eq!(breaker.current_state(), State::Open);
        assert_eq!(breaker.failure_count(), 1);
        assert_eq!(failures.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn huge_open_timeout_keeps_rejecting() {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::builder()
            .failure_threshold(1)
            .open_timeout(Duration::MAX)
            .clock(clock.clone())
            .build()
            .unwrap();

        let _ = breaker.call(|| Err::<(), _>("boom"));
        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert_eq!(breaker.call(|| Ok::<_, &str>(())), Err(BreakerError::Open));
    }

    #[test]
    fn force_open_starts_a_fresh_timeout() {
        let clock = ManualClock::new();
        let breaker = breaker(5, &clock);

        assert!(breaker.force_open());
        assert!(!breaker.force_open());
        assert_eq!(breaker.call(|| Ok::<_, &str>(())), Err(BreakerError::Open));

        clock.advance(Duration::from_secs(10));
        assert_eq!(breaker.call(|| Ok::<_, &str>(())), Ok(()));
        assert!(!breaker.force_closed());
    }

    #[test]
    fn clones_share_health() {
        let clock = ManualClock::new();
        let breaker = breaker(2, &clock);
        let other = breaker.clone();

        let _ = breaker.call(|| Err::<(), _>("boom"));
        let _ = other.call(|| Err::<(), _>("boom"));

        assert_eq!(breaker.current_state(), State::Open);
        assert_eq!(other.current_state(), State::Open);
    }
}
