//! Error types for breakers, retry executors and their configuration.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Result type for circuit breaker operations.
pub type BreakerResult<T, E> = Result<T, BreakerError<E>>;

/// Result type for retry executor runs.
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Error type for circuit breaker operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not attempted.
    Open,

    /// The underlying operation ran and failed.
    Operation(E),
}

impl<E> BreakerError<E> {
    /// Returns true if the breaker refused to run the operation.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open)
    }

    /// Returns the operation's own error, if it ran.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            BreakerError::Open => None,
            BreakerError::Operation(e) => Some(e),
        }
    }

    /// Consumes the error and returns the operation's own error, if it ran.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            BreakerError::Open => None,
            BreakerError::Operation(e) => Some(e),
        }
    }
}

impl<E> Display for BreakerError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open => write!(f, "Circuit breaker is open"),
            BreakerError::Operation(e) => write!(f, "Operation error: {}", e),
        }
    }
}

impl<E: Error + 'static> Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BreakerError::Open => None,
            BreakerError::Operation(e) => Some(e),
        }
    }
}

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The operation itself failed.
    Operation,

    /// A breaker refused to run the operation.
    CircuitOpen,
}

/// Maps an error onto an [`ErrorKind`].
///
/// Breaker errors report `CircuitOpen` for fast-fail rejections. Error types
/// that wrap a [`BreakerError`] can implement it to keep
/// [`RetryError::is_circuit_open`] meaningful.
pub trait Classify {
    /// The kind of this failure.
    fn kind(&self) -> ErrorKind {
        ErrorKind::Operation
    }
}

impl<E> Classify for BreakerError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            BreakerError::Open => ErrorKind::CircuitOpen,
            BreakerError::Operation(_) => ErrorKind::Operation,
        }
    }
}

/// Terminal failure of a retry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every permitted attempt failed; carries the last failure.
    Exhausted {
        /// Attempts made, always equal to the configured maximum.
        attempts: u32,
        /// Error from the final attempt.
        last: E,
    },

    /// The retry policy declined to retry this failure (by default, an open circuit).
    Aborted {
        /// Attempts made before giving up.
        attempts: u32,
        /// The failure that stopped the loop.
        error: E,
    },

    /// Cancellation was observed before the next attempt started.
    Cancelled {
        /// Attempts made before cancellation.
        attempts: u32,
        /// Error from the last attempt, if any attempt ran.
        last: Option<E>,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts that were made.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. }
            | RetryError::Aborted { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// The last observed failure.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Aborted { error, .. } => Some(error),
            RetryError::Cancelled { last, .. } => last.as_ref(),
        }
    }

    /// Consumes the error, returning the last observed failure.
    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Aborted { error, .. } => Some(error),
            RetryError::Cancelled { last, .. } => last,
        }
    }

    /// Returns true if attempts ran out.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// Returns true if the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}

impl<E: Classify> RetryError<E> {
    /// Returns true if the last failure was an open-circuit rejection.
    pub fn is_circuit_open(&self) -> bool {
        self.last_error()
            .map(|e| e.kind() == ErrorKind::CircuitOpen)
            .unwrap_or(false)
    }
}

impl<E> Display for RetryError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted { attempts, last } => {
                write!(f, "Retries exhausted after {} attempts: {}", attempts, last)
            }
            RetryError::Aborted { attempts, error } => {
                write!(f, "Retry aborted after {} attempts: {}", attempts, error)
            }
            RetryError::Cancelled {
                attempts,
                last: Some(last),
            } => write!(f, "Retry cancelled after {} attempts: {}", attempts, last),
            RetryError::Cancelled {
                attempts,
                last: None,
            } => write!(f, "Retry cancelled after {} attempts", attempts),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.last_error().map(|e| e as &(dyn Error + 'static))
    }
}

/// Invalid breaker or retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `failure_threshold` must be at least 1.
    ZeroFailureThreshold,

    /// `max_attempts` must be at least 1.
    ZeroMaxAttempts,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroFailureThreshold => write!(f, "failure_threshold must be > 0"),
            ConfigError::ZeroMaxAttempts => write!(f, "max_attempts must be > 0"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Boom;

    impl Display for Boom {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl Error for Boom {}
    impl Classify for Boom {}

    #[test]
    fn breaker_error_kinds() {
        assert_eq!(BreakerError::<Boom>::Open.kind(), ErrorKind::CircuitOpen);
        assert_eq!(BreakerError::Operation(Boom).kind(), ErrorKind::Operation);
        assert_eq!(Boom.kind(), ErrorKind::Operation);
    }

    #[test]
    fn breaker_error_display_and_source() {
        let open = BreakerError::<Boom>::Open;
        assert_eq!(open.to_string(), "Circuit breaker is open");
        assert!(open.source().is_none());

        let op = BreakerError::Operation(Boom);
        assert_eq!(op.to_string(), "Operation error: boom");
        assert!(op.source().is_some());
        assert_eq!(op.into_operation_error(), Some(Boom));
    }

    #[test]
    fn retry_error_accessors() {
        let err = RetryError::Exhausted {
            attempts: 3,
            last: BreakerError::Operation(Boom),
        };
        assert_eq!(err.attempts(), 3);
        assert!(err.is_exhausted());
        assert!(!err.is_circuit_open());
        assert_eq!(
            err.to_string(),
            "Retries exhausted after 3 attempts: Operation error: boom"
        );

        let aborted = RetryError::Aborted {
            attempts: 1,
            error: BreakerError::<Boom>::Open,
        };
        assert!(aborted.is_circuit_open());
        assert_eq!(aborted.into_last_error(), Some(BreakerError::Open));
    }

    #[test]
    fn cancelled_without_attempts_has_no_source() {
        let err: RetryError<Boom> = RetryError::Cancelled {
            attempts: 0,
            last: None,
        };
        assert!(err.is_cancelled());
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "Retry cancelled after 0 attempts");
    }

    #[test]
    fn config_error_messages() {
        assert_eq!(
            ConfigError::ZeroMaxAttempts.to_string(),
            "max_attempts must be > 0"
        );
    }
}
