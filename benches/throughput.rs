use criterion::{black_box, criterion_group, criterion_main, Criterion};
use faultguard_rs::{CircuitBreaker, Clock, RetryExecutor};
use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct BenchError(String);

impl BenchError {
    fn new(msg: &str) -> Self {
        BenchError(msg.to_string())
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Benchmark error: {}", self.0)
    }
}

impl Error for BenchError {}

// Real time, but delays return at once and leave no history behind
struct NoDelayClock;

impl Clock for NoDelayClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, _duration: Duration) {}
}

fn successful_operation() -> Result<(), BenchError> {
    Ok(())
}

fn failing_operation() -> Result<(), BenchError> {
    Err(BenchError::new("Simulated failure"))
}

fn bench_circuit_breaker_closed(c: &mut Criterion) {
    let breaker = CircuitBreaker::new(5, Duration::from_secs(30)).unwrap();

    c.bench_function("circuit_breaker_closed_success", |b| {
        b.iter(|| black_box(breaker.call(successful_operation)));
    });
}

fn bench_circuit_breaker_open_rejection(c: &mut Criterion) {
    let breaker = CircuitBreaker::new(1, Duration::from_secs(3600)).unwrap();
    breaker.force_open();

    c.bench_function("circuit_breaker_open_rejection", |b| {
        b.iter(|| black_box(breaker.call(successful_operation)));
    });
}

fn bench_circuit_breaker_transition(c: &mut Criterion) {
    let breaker = CircuitBreaker::new(5, Duration::from_secs(30)).unwrap();

    c.bench_function("circuit_breaker_transition", |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                // Force closed to ensure consistent starting point
                breaker.force_closed();

                // Make 5 failing calls to trip the breaker
                for _ in 0..5 {
                    let _ = black_box(breaker.call(failing_operation));
                }

                // One open-circuit rejection
                let _ = black_box(breaker.call(successful_operation));
            }

            start.elapsed()
        });
    });
}

fn bench_retry_guarded(c: &mut Criterion) {
    let breaker = CircuitBreaker::builder()
        .failure_threshold(u32::MAX)
        .build()
        .unwrap();
    let retry = RetryExecutor::builder()
        .max_attempts(3)
        .delay(Duration::from_millis(100))
        .clock(NoDelayClock)
        .build()
        .unwrap();

    c.bench_function("retry_guarded_two_failures", |b| {
        b.iter(|| {
            let mut n = 0;
            black_box(retry.run_guarded(&breaker, || {
                n += 1;
                if n < 3 {
                    failing_operation()
                } else {
                    successful_operation()
                }
            }))
        });
    });
}

fn bench_circuit_breaker_concurrent(c: &mut Criterion) {
    use std::sync::{Arc, Barrier};
    use std::thread;

    let breaker = CircuitBreaker::new(100, Duration::from_secs(30)).unwrap();

    const THREAD_COUNT: usize = 4;
    const ITERATIONS_PER_THREAD: usize = 1000;

    c.bench_function("circuit_breaker_concurrent", |b| {
        b.iter(|| {
            let barrier = Arc::new(Barrier::new(THREAD_COUNT + 1));
            let mut handles = Vec::with_capacity(THREAD_COUNT);

            for _ in 0..THREAD_COUNT {
                let thread_breaker = breaker.clone();
                let thread_barrier = Arc::clone(&barrier);

                handles.push(thread::spawn(move || {
                    thread_barrier.wait();
                    for _ in 0..ITERATIONS_PER_THREAD {
                        let _ = black_box(thread_breaker.call(successful_operation));
                    }
                }));
            }

            // Start all threads simultaneously
            barrier.wait();

            for handle in handles {
                handle.join().unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_circuit_breaker_closed,
    bench_circuit_breaker_open_rejection,
    bench_circuit_breaker_transition,
    bench_retry_guarded,
    bench_circuit_breaker_concurrent
);
criterion_main!(benches);
