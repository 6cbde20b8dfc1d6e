//! Time sources for breakers and retry executors.
//!
//! Everything that reads "now" or waits between attempts goes through the
//! [`Clock`] trait, so tests can swap in a [`ManualClock`] and move time
//! forward without sleeping.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "async")]
use futures::future::BoxFuture;

static SYSTEM_CLOCK: Lazy<Arc<SystemClock>> = Lazy::new(|| Arc::new(SystemClock));

/// A monotonic time source with the ability to wait.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current monotonic instant.
    fn now(&self) -> Instant;

    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);

    /// Returns a future that completes after `duration` without blocking the executor.
    #[cfg(feature = "async")]
    fn sleep_async(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// The process-wide shared system clock.
pub fn system_clock() -> Arc<dyn Clock> {
    SYSTEM_CLOCK.clone()
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Wall-clock implementation backed by [`Instant::now`] and [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

#[derive(Debug)]
struct ManualInner {
    origin: Instant,
    offset: Duration,
    sleeps: Vec<Duration>,
}

/// A clock that only moves when told to.
///
/// `sleep` returns immediately after advancing the clock by the requested
/// duration and remembering it, so retry delays can be asserted exactly.
/// Clones share the same timeline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualInner>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualInner {
                origin: Instant::now(),
                offset: Duration::ZERO,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, duration: Duration) {
        self.inner.lock().offset += duration;
    }

    /// Total time advanced since creation, by `advance` and `sleep` combined.
    pub fn elapsed(&self) -> Duration {
        self.inner.lock().offset
    }

    /// Every duration passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().sleeps.clone()
    }

    /// Number of `sleep` calls observed.
    pub fn sleep_count(&self) -> usize {
        self.inner.lock().sleeps.len()
    }

    fn record_sleep(&self, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.offset += duration;
        inner.sleeps.push(duration);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let inner = self.inner.lock();
        inner.origin + inner.offset
    }

    fn sleep(&self, duration: Duration) {
        self.record_sleep(duration);
    }

    #[cfg(feature = "async")]
    fn sleep_async(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.record_sleep(duration);
        Box::pin(futures::future::ready(()))
    }
}
