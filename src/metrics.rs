//! Metric sink seam for breaker and retry events.

use crate::state::State;
use std::time::Duration;

/// Trait for metrics sinks that can receive breaker and retry events.
///
/// Sinks are called after the breaker lock is released.
pub trait MetricSink: Send + Sync + 'static {
    /// Records a state transition event.
    fn record_state_transition(&self, from: State, to: State);

    /// Records the outcome of an operation the breaker let through.
    fn record_call(&self, success: bool, duration: Duration);

    /// Records a fast-fail rejection.
    fn record_rejection(&self);

    /// Records that a retry executor is about to wait before `attempt`.
    fn record_retry(&self, attempt: u32, delay: Duration);
}

/// A null metrics sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record_state_transition(&self, _from: State, _to: State) {}
    fn record_call(&self, _success: bool, _duration: Duration) {}
    fn record_rejection(&self) {}
    fn record_retry(&self, _attempt: u32, _delay: Duration) {}
}
