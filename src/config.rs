//! Builders for circuit breakers and retry executors.

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::clock::{system_clock, Clock};
use crate::error::ConfigError;
use crate::hook::HookRegistry;
use crate::metrics::{MetricSink, NullMetricSink};
use crate::policy::DefaultRetryPolicy;
use crate::retry::RetryExecutor;

/// Default number of consecutive failures that trips a breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time a tripped breaker stays open before allowing a trial call.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default total attempts made by a retry executor, first attempt included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default fixed delay between retry attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Builder for creating circuit breakers with custom configurations.
#[derive(Clone)]
pub struct BreakerBuilder {
    pub(crate) name: Option<Arc<str>>,
    pub(crate) failure_threshold: u32,
    pub(crate) open_timeout: Duration,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) metric_sink: Arc<dyn MetricSink>,
    pub(crate) hook_registry: Arc<HookRegistry>,
}

impl Default for BreakerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BreakerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerBuilder")
            .field("name", &self.name)
            .field("failure_threshold", &self.failure_threshold)
            .field("open_timeout", &self.open_timeout)
            .finish_non_exhaustive()
    }
}

impl BreakerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            name: None,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            clock: system_clock(),
            metric_sink: Arc::new(NullMetricSink),
            hook_registry: Arc::new(HookRegistry::new()),
        }
    }

    /// Names the protected resource; the name appears in log events.
    pub fn name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the number of consecutive failures that trips the circuit.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets how long the circuit stays open before a trial call is allowed.
    pub fn open_timeout(mut self, duration: Duration) -> Self {
        self.open_timeout = duration;
        self
    }

    /// Sets the time source.
    pub fn clock<C: Clock>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Sets an already shared time source.
    pub fn shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets a metric sink for the circuit breaker.
    pub fn metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Sets an already shared metric sink.
    pub fn shared_metric_sink(mut self, sink: Arc<dyn MetricSink>) -> Self {
        self.metric_sink = sink;
        self
    }

    /// Sets a hook registry for the circuit breaker.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hook_registry = Arc::new(hooks);
        self
    }

    /// Validates the settings and builds a circuit breaker.
    pub fn build(self) -> Result<CircuitBreaker, ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }

        Ok(CircuitBreaker::from_builder(self))
    }
}

/// Builder for creating retry executors.
pub struct RetryBuilder<P = DefaultRetryPolicy> {
    max_attempts: u32,
    delay: Duration,
    policy: P,
    clock: Arc<dyn Clock>,
    metric_sink: Arc<dyn MetricSink>,
}

impl Default for RetryBuilder<DefaultRetryPolicy> {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryBuilder<DefaultRetryPolicy> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
            policy: DefaultRetryPolicy,
            clock: system_clock(),
            metric_sink: Arc::new(NullMetricSink),
        }
    }
}

impl<P> RetryBuilder<P> {
    /// Sets the total number of attempts, including the first.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the fixed delay between attempts.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the time source used for delays.
    pub fn clock<C: Clock>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Sets an already shared time source.
    pub fn shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets a metric sink for retry events.
    pub fn metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Sets an already shared metric sink.
    pub fn shared_metric_sink(mut self, sink: Arc<dyn MetricSink>) -> Self {
        self.metric_sink = sink;
        self
    }

    /// Replaces the retry policy.
    pub fn policy<Q>(self, policy: Q) -> RetryBuilder<Q> {
        RetryBuilder {
            max_attempts: self.max_attempts,
            delay: self.delay,
            policy,
            clock: self.clock,
            metric_sink: self.metric_sink,
        }
    }

    /// Validates the settings and builds a retry executor.
    pub fn build(self) -> Result<RetryExecutor<P>, ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroMaxAttempts);
        }

        Ok(RetryExecutor::from_parts(
            self.max_attempts,
            self.delay,
            self.policy,
            self.clock,
            self.metric_sink,
        ))
    }
}
