//! Benchmarks for the hot detection path
//!
//! This benchmark measures:
//! - Circuit breaker overhead on a closed breaker
//! - Rejection cost on an open breaker
//! - Fallback chain walk with a failing primary layer
//! - Protection level computation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use guardian_resilience::health::compute_protection_level;
use guardian_resilience::{
    CircuitBreaker, CircuitBreakerConfig, DetectionInput, DetectionLayer, DetectionResult, Error,
    FallbackChain, FallbackChainConfig, HealthCheckResult, RiskLevel,
};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn bench_circuit_breaker(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("circuit_breaker");

    let closed = CircuitBreaker::new(CircuitBreakerConfig::new().with_name("bench.closed"));
    group.bench_function("closed_success", |b| {
        b.to_async(&rt).iter(|| async {
            closed
                .execute(|| async { Ok::<_, Error>(black_box(1u32)) })
                .await
                .unwrap()
        })
    });

    let open = rt.block_on(async {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::new().with_name("bench.open"));
        cb.force_open();
        cb
    });
    group.bench_function("open_rejection", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = open.execute(|| async { Ok::<_, Error>(1u32) }).await;
        })
    });

    group.finish();
}

fn bench_fallback_chain(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("fallback_chain");
    let input = DetectionInput::new("https://example.test/login").with_content("<form>");

    for failing in [0usize, 1, 3] {
        let chain = FallbackChain::new(
            FallbackChainConfig::default()
                .with_breaker(CircuitBreakerConfig::new().with_failure_threshold(u32::MAX)),
        );
        for (i, layer) in DetectionLayer::ALL.into_iter().enumerate() {
            if i < failing {
                chain
                    .register_fn(layer, |_| async { Err(Error::handler("unavailable")) })
                    .unwrap();
            } else {
                chain
                    .register_fn(layer, |_| async {
                        Ok(DetectionResult::new(RiskLevel::Low, 0.6))
                    })
                    .unwrap();
            }
        }
        group.bench_with_input(BenchmarkId::new("failing_layers", failing), &chain, |b, chain| {
            b.to_async(&rt)
                .iter(|| async { black_box(chain.execute(&input).await.unwrap()) })
        });
    }

    group.finish();
}

fn bench_protection_level(c: &mut Criterion) {
    let results = vec![
        HealthCheckResult::unhealthy("api", "offline"),
        HealthCheckResult::healthy("local_ml"),
        HealthCheckResult::healthy("url_reputation"),
        HealthCheckResult::healthy("blocklist"),
        HealthCheckResult::unhealthy("storage", "quota"),
    ];
    c.bench_function("compute_protection_level", |b| {
        b.iter(|| compute_protection_level(black_box(&results)))
    });
}

criterion_group!(
    benches,
    bench_circuit_breaker,
    bench_fallback_chain,
    bench_protection_level
);
criterion_main!(benches);
