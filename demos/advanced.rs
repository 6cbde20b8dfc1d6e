//! Advanced Example
//!
//! This example demonstrates:
//! 1. A shared breaker registry with one breaker per downstream resource
//! 2. Hooks for monitoring circuit breaker events
//! 3. A retry executor layered over the breaker
//! 4. Cancelling a retry run from another thread

use faultguard_rs::{
    BreakerRegistry, CancelToken, CircuitBreaker, HookRegistry, RetryError, RetryExecutor,
};
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct ServiceError(String);

impl ServiceError {
    fn new(msg: &str) -> Self {
        ServiceError(msg.to_string())
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

// Fails on calls 3..=7, succeeds otherwise
fn flaky_service(calls: &AtomicU32) -> Result<String, ServiceError> {
    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
    if (3..=7).contains(&n) {
        Err(ServiceError::new("Service temporarily unavailable"))
    } else {
        Ok(format!("payload #{}", n))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "faultguard_rs=debug".into()),
        )
        .init();

    println!("=== Advanced Example ===\n");

    // 1. Hooks for observability
    let hooks = HookRegistry::new();
    hooks.set_on_open(|| println!("-> circuit OPENED"));
    hooks.set_on_half_open(|| println!("-> circuit HALF-OPEN, sending trial call"));
    hooks.set_on_close(|| println!("-> circuit CLOSED"));
    hooks.set_on_rejected(|| println!("-> call rejected"));

    // 2. One breaker per resource, all from the same template
    let registry = BreakerRegistry::new(
        CircuitBreaker::builder()
            .failure_threshold(2)
            .open_timeout(Duration::from_millis(500))
            .hooks(hooks),
    )?;
    let orders = registry.get_or_create("orders");

    // 3. Retries layered over the breaker
    let retry = RetryExecutor::new(3, Duration::from_millis(300))?;
    let calls = AtomicU32::new(0);

    for round in 1..=6 {
        println!("\nRound {}:", round);
        match retry.run_guarded(&orders, || flaky_service(&calls)) {
            Ok(value) => println!("Succeeded: {}", value),
            Err(err) if err.is_circuit_open() => {
                println!("Gave up after {} attempts: circuit open", err.attempts());
                thread::sleep(Duration::from_millis(600));
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                println!("Exhausted after {} attempts, last error: {}", attempts, last)
            }
            Err(err) => println!("Failed: {}", err),
        }
        println!("State of {:?}: {}", registry.names(), orders.current_state());
    }

    // 4. Cancellation from another thread
    println!("\nCancellation:");
    let slow_retry = RetryExecutor::new(10, Duration::from_millis(200))?;
    let token = CancelToken::new();
    let canceller = token.clone();
    let attempts = Arc::new(AtomicU32::new(0));

    let watcher = thread::spawn(move || {
        thread::sleep(Duration::from_millis(500));
        canceller.cancel();
    });

    let counted = Arc::clone(&attempts);
    let result = slow_retry.run_with_cancel(&token, || {
        counted.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(ServiceError::new("never recovers"))
    });
    watcher.join().map_err(|_| "cancel thread panicked")?;

    match result {
        Err(err) if err.is_cancelled() => println!(
            "Cancelled after {} attempts ({} observed)",
            err.attempts(),
            attempts.load(Ordering::SeqCst)
        ),
        other => println!("Unexpected outcome: {:?}", other),
    }

    Ok(())
}
