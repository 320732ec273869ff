use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tiergate::{
    BucketKey, CredentialGate, Governor, HeaderTier, LimiterRegistry, TierLimits, TierTable,
};

fn benchmark_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("single_key", |b| {
        let registry = LimiterRegistry::new();
        let limits = TierLimits::new(1_000_000.0, 1000);

        b.iter(|| {
            let admission = registry.check(
                black_box(BucketKey::new("free", "203.0.113.1")),
                black_box(limits),
                black_box(Instant::now()),
            );
            black_box(admission.allowed)
        });
    });

    // Rotate through a fixed set of clients to simulate real-world usage
    group.bench_function("rotating_keys_10k", |b| {
        let registry = LimiterRegistry::builder().capacity(10_000).build();
        let limits = TierLimits::new(100.0, 200);
        let clients: Vec<String> = (0..10_000)
            .map(|i| format!("10.0.{}.{}", i / 256, i % 256))
            .collect();
        let mut counter = 0usize;

        b.iter(|| {
            let client = &clients[counter % clients.len()];
            counter += 1;
            let admission = registry.check(
                BucketKey::new("free", black_box(client)),
                limits,
                Instant::now(),
            );
            black_box(admission.allowed)
        });
    });

    group.bench_function("rotating_keys_with_eviction", |b| {
        let registry = LimiterRegistry::builder()
            .capacity(10_000)
            .idle_timeout(Duration::from_secs(1))
            .sweep_interval(Duration::from_millis(100))
            .build();
        let limits = TierLimits::new(100.0, 200);
        let mut counter = 0u64;

        b.iter(|| {
            let client = format!("client_{}", counter % 100_000);
            counter += 1;
            let admission =
                registry.check(BucketKey::new("free", &client), limits, Instant::now());
            black_box(admission.allowed)
        });
    });

    group.finish();
}

fn benchmark_governor(c: &mut Criterion) {
    let mut group = c.benchmark_group("governor");
    group.throughput(Throughput::Elements(1));

    group.bench_function("header_tier", |b| {
        let governor = Governor::header_tiered(HeaderTier::default(), TierTable::standard());
        let headers = [
            ("X-User-Category", "enterprise"),
            ("X-Forwarded-For", "203.0.113.7, 10.0.0.2"),
        ];

        b.iter(|| {
            let decision = governor.check(black_box(&headers[..]), "10.0.0.1:443", Instant::now());
            black_box(decision.is_allowed())
        });
    });

    group.bench_function("credential_gate", |b| {
        let governor =
            Governor::credential_gated(CredentialGate::default(), TierLimits::new(10.0, 20));
        let headers = [
            ("Authorization", "Basic ZnJlZTpmcmVl"),
            ("X-Real-Ip", "203.0.113.7"),
        ];

        b.iter(|| {
            let decision = governor.check(black_box(&headers[..]), "10.0.0.1:443", Instant::now());
            black_box(decision.is_allowed())
        });
    });

    group.finish();
}

fn benchmark_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    group.sample_size(20);

    for threads in [2usize, 4, 8] {
        group.bench_function(format!("{threads}_threads_1000_each"), |b| {
            let registry = Arc::new(LimiterRegistry::new());
            let limits = TierLimits::new(1_000_000.0, 1000);

            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let registry = Arc::clone(&registry);
                        thread::spawn(move || {
                            let client = format!("client_{t}");
                            for _ in 0..1000 {
                                black_box(registry.check(
                                    BucketKey::new("free", &client),
                                    limits,
                                    Instant::now(),
                                ));
                            }
                        })
                    })
                    .collect();

                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_registry,
    benchmark_governor,
    benchmark_contention
);
criterion_main!(benches);
