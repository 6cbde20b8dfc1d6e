//! # faultguard-rs
//!
//! A circuit breaker and a fixed-interval retry executor that compose around
//! any fallible operation.
//!
//! ## Circuit breaker
//!
//! A [`CircuitBreaker`] tracks consecutive failures of one protected
//! resource and moves between three states:
//!
//! - **Closed**: calls pass through. A success resets the failure count;
//!   reaching `failure_threshold` consecutive failures opens the circuit.
//! - **Open**: calls fail fast with [`BreakerError::Open`] without running
//!   the operation, until `open_timeout` has elapsed since the last failure.
//! - **Half-Open**: exactly one trial call runs. Success closes the circuit,
//!   failure reopens it.
//!
//! ## Retry executor
//!
//! A [`RetryExecutor`] runs an operation up to `max_attempts` times with a
//! fixed delay in between. By default every failure is retried, for any error
//! type. When the executor drives a breaker through
//! [`RetryExecutor::run_guarded`], an open-circuit rejection ends the run
//! immediately unless the policy opts in with [`RetryAll`].
//!
//! ## Basic Usage
//!
//! ```rust
//! use faultguard_rs::{CircuitBreaker, RetryError, RetryExecutor};
//! use std::error::Error;
//! use std::fmt;
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct ServiceError(String);
//!
//! impl fmt::Display for ServiceError {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         write!(f, "Service error: {}", self.0)
//!     }
//! }
//!
//! impl Error for ServiceError {}
//!
//! let breaker = CircuitBreaker::new(3, Duration::from_secs(10)).unwrap();
//! let retry = RetryExecutor::new(3, Duration::from_millis(1)).unwrap();
//!
//! match retry.run_guarded(&breaker, || {
//!     // Your service call that might fail
//!     Ok::<_, ServiceError>("Success".to_string())
//! }) {
//!     Ok(result) => println!("Call succeeded: {}", result),
//!     Err(err) if err.is_circuit_open() => println!("Circuit is open, call was prevented"),
//!     Err(RetryError::Exhausted { attempts, last }) => {
//!         println!("Gave up after {} attempts: {}", attempts, last)
//!     }
//!     Err(err) => println!("Other error: {}", err),
//! }
//! ```
//!
//! ## Testing with a manual clock
//!
//! Both components read time through [`Clock`]. Inject a [`ManualClock`] to
//! drive timeouts and delays deterministically.
//!
//! ## Features
//!
//! - `std` - Standard library support (default)
//! - `async` - `call_async`, `run_async` and non-blocking delays on Tokio

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod breaker;
mod cancel;
mod clock;
mod config;
mod error;
mod hook;
mod metrics;
mod policy;
pub mod prelude;
mod registry;
mod retry;
mod state;

// Re-exports
pub use breaker::CircuitBreaker;
pub use cancel::CancelToken;
pub use clock::{system_clock, Clock, ManualClock, SystemClock};
pub use config::{
    BreakerBuilder, RetryBuilder, DEFAULT_FAILURE_THRESHOLD, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_OPEN_TIMEOUT, DEFAULT_RETRY_DELAY,
};
pub use error::{
    BreakerError, BreakerResult, Classify, ConfigError, ErrorKind, RetryError, RetryResult,
};
pub use hook::HookRegistry;
pub use metrics::{MetricSink, NullMetricSink};
pub use policy::{DefaultRetryPolicy, RetryAll, RetryPolicy};
pub use registry::BreakerRegistry;
pub use retry::{AttemptRecord, RetryExecutor, RetryReport};
pub use state::{BreakerSnapshot, State};
