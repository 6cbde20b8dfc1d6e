//! Circuit breaker state machine implementation.

use std::fmt;
use std::time::{Duration, Instant};

/// Represents the possible states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Circuit is closed and operations are allowed.
    Closed,

    /// Circuit is open and operations are rejected.
    Open,

    /// Circuit is allowing a single trial operation to test recovery.
    HalfOpen,
}

impl State {
    /// Stable lowercase label, used for metrics and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A consistent view of a breaker's health record at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    /// Current state.
    pub state: State,
    /// Consecutive failures observed while closed or half-open.
    pub failure_count: u32,
    /// Time of the most recent recorded failure, if any.
    pub last_failure_time: Option<Instant>,
}

/// A state change produced by one of the [`BreakerCore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: State,
    pub(crate) to: State,
}

impl Transition {
    fn new(from: State, to: State) -> Self {
        Self { from, to }
    }
}

/// What the breaker decided for one incoming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Permit {
    /// Ordinary call while closed.
    Normal,
    /// The single half-open trial call, tagged with the epoch that issued it.
    Trial(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Allowed(Permit),
    Rejected,
}

/// The mutable health record of a breaker.
///
/// Never shared directly: the breaker keeps it behind a single mutex and
/// every method here runs with that lock held.
#[derive(Debug)]
pub(crate) struct BreakerCore {
    state: State,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    trial_in_flight: bool,
    // bumped on every Open -> HalfOpen so late trial results can be told apart
    epoch: u64,
}

impl BreakerCore {
    pub(crate) fn new() -> Self {
        Self {
            state: State::Closed,
            failure_count: 0,
            last_failure_time: None,
            trial_in_flight: false,
            epoch: 0,
        }
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            failure_count: self.failure_count,
            last_failure_time: self.last_failure_time,
        }
    }

    /// Decides whether a call may run, moving `Open -> HalfOpen` once the
    /// timeout has elapsed (boundary inclusive).
    pub(crate) fn admit(
        &mut self,
        now: Instant,
        open_timeout: Duration,
    ) -> (Admission, Option<Transition>) {
        match self.state {
            State::Closed => (Admission::Allowed(Permit::Normal), None),
            State::Open => {
                let since = self.last_failure_time.unwrap_or(now);
                if now.saturating_duration_since(since) >= open_timeout {
                    self.state = State::HalfOpen;
                    self.trial_in_flight = true;
                    self.epoch = self.epoch.wrapping_add(1);
                    (
                        Admission::Allowed(Permit::Trial(self.epoch)),
                        Some(Transition::new(State::Open, State::HalfOpen)),
                    )
                } else {
                    (Admission::Rejected, None)
                }
            }
            State::HalfOpen => {
                if self.trial_in_flight {
                    (Admission::Rejected, None)
                } else {
                    self.trial_in_flight = true;
                    (Admission::Allowed(Permit::Trial(self.epoch)), None)
                }
            }
        }
    }

    pub(crate) fn on_success(&mut self, permit: Permit) -> Option<Transition> {
        self.failure_count = 0;

        match permit {
            Permit::Trial(epoch) if self.is_current_trial(epoch) => {
                self.trial_in_flight = false;
                self.state = State::Closed;
                Some(Transition::new(State::HalfOpen, State::Closed))
            }
            _ => None,
        }
    }

    pub(crate) fn on_failure(
        &mut self,
        permit: Permit,
        now: Instant,
        failure_threshold: u32,
    ) -> Option<Transition> {
        match permit {
            Permit::Normal if self.state == State::Closed => {
                self.failure_count = self.failure_count.saturating_add(1);
                self.last_failure_time = Some(now);
                if self.failure_count >= failure_threshold {
                    self.state = State::Open;
                    Some(Transition::new(State::Closed, State::Open))
                } else {
                    None
                }
            }
            Permit::Trial(epoch) if self.is_current_trial(epoch) => {
                self.failure_count = self.failure_count.saturating_add(1);
                self.last_failure_time = Some(now);
                self.trial_in_flight = false;
                self.state = State::Open;
                Some(Transition::new(State::HalfOpen, State::Open))
            }
            // A straggler admitted under an earlier state; its outcome no
            // longer describes the current episode.
            _ => None,
        }
    }

    pub(crate) fn force_open(&mut self, now: Instant) -> Option<Transition> {
        if self.state == State::Open {
            return None;
        }

        let from = self.state;
        self.state = State::Open;
        self.trial_in_flight = false;
        self.last_failure_time = Some(now);
        Some(Transition::new(from, State::Open))
    }

    pub(crate) fn force_closed(&mut self) -> Option<Transition> {
        if self.state == State::Closed {
            return None;
        }

        let from = self.state;
        self.state = State::Closed;
        self.trial_in_flight = false;
        self.failure_count = 0;
        Some(Transition::new(from, State::Closed))
    }

    fn is_current_trial(&self, epoch: u64) -> bool {
        self.state == State::HalfOpen && self.trial_in_flight && self.epoch == epoch
    }
}
