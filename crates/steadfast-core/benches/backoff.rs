//! Benchmarks for backoff computation and failure classification.
//!
//! Run with: cargo bench -p steadfast-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use steadfast_core::retry::backoff;
use steadfast_core::retry::classifier::is_retryable;
use steadfast_core::{CallError, RetryPolicy};

fn benchmark_backoff(c: &mut Criterion) {
    let policy = RetryPolicy::default();
    let mut group = c.benchmark_group("backoff_delay");

    for jitter in [false, true] {
        let policy = RetryPolicy::builder().jitter(jitter).build().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        group.bench_with_input(BenchmarkId::from_parameter(jitter), &policy, |b, p| {
            b.iter(|| {
                for attempt in 1..=10 {
                    black_box(backoff::delay(black_box(attempt), p.backoff(), &mut rng));
                }
            })
        });
    }
    group.finish();

    c.bench_function("backoff_base_delay_overflow", |b| {
        b.iter(|| backoff::base_delay(black_box(u32::MAX), policy.backoff()))
    });
}

fn benchmark_classifier(c: &mut Criterion) {
    let policy = RetryPolicy::default();
    let retryable = CallError::http(503, "Service Unavailable");
    let terminal = CallError::new("SyntaxError", "Unexpected token < in JSON at position 0");

    c.bench_function("classify_retryable", |b| {
        b.iter(|| is_retryable(black_box(&retryable), &policy))
    });

    // Worst case: every signature is scanned
    c.bench_function("classify_terminal", |b| {
        b.iter(|| is_retryable(black_box(&terminal), &policy))
    });
}

criterion_group!(benches, benchmark_backoff, benchmark_classifier);
criterion_main!(benches);
