//! Re-exports the types most call sites need.
//!
//! # Example
//! ```rust,no_run
//! use faultguard_rs::prelude::*;
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new(5, Duration::from_secs(30)).unwrap();
//! let retry = RetryExecutor::new(3, Duration::from_secs(1)).unwrap();
//! let _ = retry.run_guarded(&breaker, || Ok::<_, std::io::Error>(()));
//! ```

pub use crate::{
    BreakerError, CancelToken, CircuitBreaker, Classify, Clock, ErrorKind, RetryError,
    RetryExecutor, RetryPolicy, State,
};
