use faultguard_rs::{BreakerError, CircuitBreaker};
use std::error::Error;
use std::fmt;
use std::thread;
use std::time::Duration;

// Custom error type that implements Error trait
#[derive(Debug)]
struct ServiceError(String);

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "faultguard_rs=debug".into()),
        )
        .init();

    // Trip after 3 consecutive failures, stay open for 2 seconds
    let breaker = match CircuitBreaker::builder()
        .name("inventory")
        .failure_threshold(3)
        .open_timeout(Duration::from_secs(2))
        .build()
    {
        Ok(breaker) => breaker,
        Err(err) => {
            eprintln!("invalid breaker configuration: {}", err);
            return;
        }
    };

    println!("Circuit initial state: {}", breaker.current_state());

    let mut counter = 0u32;
    let call_service = |counter: &mut u32| -> Result<String, ServiceError> {
        *counter += 1;
        if (4..=8).contains(&*counter) {
            Err(ServiceError("External service error".to_string()))
        } else {
            Ok(format!("response #{}", counter))
        }
    };

    for i in 1..=15 {
        print!("Attempt {}: ", i);

        match breaker.call(|| call_service(&mut counter)) {
            Ok(result) => println!("Call succeeded with result: {}", result),
            Err(BreakerError::Open) => println!("Circuit is open, call was prevented"),
            Err(BreakerError::Operation(err)) => println!("Call failed with error: {}", err),
        }

        let snapshot = breaker.snapshot();
        println!(
            "  state: {}, consecutive failures: {}",
            snapshot.state, snapshot.failure_count
        );

        thread::sleep(Duration::from_millis(400));
    }
}
