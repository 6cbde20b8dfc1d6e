use faultguard_rs::{
    BreakerError, CircuitBreaker, Clock, ManualClock, RetryError, RetryExecutor, State,
};
use proptest::prelude::*;
use std::cell::Cell;
use std::time::Duration;

fn breaker(threshold: u32, timeout: Duration, clock: &ManualClock) -> CircuitBreaker {
    CircuitBreaker::builder()
        .failure_threshold(threshold)
        .open_timeout(timeout)
        .clock(clock.clone())
        .build()
        .unwrap()
}

fn retry(max_attempts: u32, delay: Duration, clock: &ManualClock) -> RetryExecutor {
    RetryExecutor::builder()
        .max_attempts(max_attempts)
        .delay(delay)
        .clock(clock.clone())
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn n_failures_open_the_circuit(threshold in 1u32..50, timeout_ms in 1u64..10_000) {
        let clock = ManualClock::new();
        let breaker = breaker(threshold, Duration::from_millis(timeout_ms), &clock);

        for i in 1..=threshold {
            prop_assert_eq!(breaker.current_state(), State::Closed);
            let result = breaker.call(|| Err::<(), _>("down"));
            // the tripping call still sees the operation's own failure
            prop_assert_eq!(result, Err(BreakerError::Operation("down")));
            prop_assert_eq!(breaker.failure_count(), i);
        }
        prop_assert_eq!(breaker.current_state(), State::Open);

        let invoked = Cell::new(false);
        let result = breaker.call(|| {
            invoked.set(true);
            Ok::<_, &str>(())
        });
        prop_assert_eq!(result, Err(BreakerError::Open));
        prop_assert!(!invoked.get());
    }

    #[test]
    fn trial_runs_once_timeout_elapses(
        timeout_ms in 0u64..10_000,
        extra_ms in 0u64..10_000,
        trial_succeeds in any::<bool>(),
    ) {
        let clock = ManualClock::new();
        let breaker = breaker(1, Duration::from_millis(timeout_ms), &clock);
        let _ = breaker.call(|| Err::<(), _>("down"));

        clock.advance(Duration::from_millis(timeout_ms + extra_ms));
        let invocations = Cell::new(0);
        let _ = breaker.call(|| {
            invocations.set(invocations.get() + 1);
            if trial_succeeds { Ok(()) } else { Err("still down") }
        });
        prop_assert_eq!(invocations.get(), 1);

        let snapshot = breaker.snapshot();
        if trial_succeeds {
            prop_assert_eq!(snapshot.state, State::Closed);
            prop_assert_eq!(snapshot.failure_count, 0);
        } else {
            prop_assert_eq!(snapshot.state, State::Open);
            prop_assert_eq!(snapshot.last_failure_time, Some(clock.now()));
        }
    }

    #[test]
    fn success_resets_count_at_any_depth(threshold in 2u32..50, failures in 1u32..49) {
        prop_assume!(failures < threshold);
        let clock = ManualClock::new();
        let breaker = breaker(threshold, Duration::from_secs(1), &clock);

        for _ in 0..failures {
            let _ = breaker.call(|| Err::<(), _>("down"));
        }
        prop_assert_eq!(breaker.failure_count(), failures);

        prop_assert!(breaker.call(|| Ok::<_, &str>(())).is_ok());
        prop_assert_eq!(breaker.failure_count(), 0);
        prop_assert_eq!(breaker.current_state(), State::Closed);
    }

    #[test]
    fn success_on_last_attempt_takes_m_minus_one_delays(max in 1u32..20, delay_ms in 0u64..5_000) {
        let clock = ManualClock::new();
        let retry = retry(max, Duration::from_millis(delay_ms), &clock);
        let calls = Cell::new(0u32);

        let result = retry.run(|| {
            calls.set(calls.get() + 1);
            if calls.get() < max { Err("transient") } else { Ok(calls.get()) }
        });

        prop_assert_eq!(result, Ok(max));
        prop_assert_eq!(calls.get(), max);
        prop_assert_eq!(clock.sleep_count() as u32, max - 1);
        prop_assert!(clock.sleeps().iter().all(|d| *d == Duration::from_millis(delay_ms)));
    }

    #[test]
    fn all_failures_exhaust_with_attempt_count(max in 1u32..20) {
        let clock = ManualClock::new();
        let retry = retry(max, Duration::from_millis(10), &clock);
        let calls = Cell::new(0u32);

        let result = retry.run(|| {
            calls.set(calls.get() + 1);
            Err::<(), _>("permanent")
        });

        prop_assert_eq!(result, Err(RetryError::Exhausted { attempts: max, last: "permanent" }));
        prop_assert_eq!(calls.get(), max);
        prop_assert_eq!(clock.sleep_count() as u32, max - 1);
    }
}
