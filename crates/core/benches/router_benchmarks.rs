use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use std::time::Duration;

use chrono::Utc;
use redelivery_core::headers::Headers;
use redelivery_core::{Delivery, FailureKind, RecordEnvelope, RetryPolicy, Router};

fn bench_route_full_journey(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_full_journey");

    for max_attempts in [1u32, 4, 16] {
        let router = Router::new(
            "user-events",
            &RetryPolicy::exponential(
                max_attempts,
                Duration::from_millis(100),
                Duration::from_secs(30),
            ),
        )
        .unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(max_attempts),
            &max_attempts,
            |b, _| {
                b.iter(|| {
                    let mut env = RecordEnvelope::new("user-events", None, ());
                    loop {
                        match router.route(env, FailureKind::Retryable, "bench") {
                            redelivery_core::RouteDecision::Retry { envelope, .. } => {
                                env = envelope
                            }
                            redelivery_core::RouteDecision::DeadLetter { envelope } => {
                                black_box(envelope);
                                break;
                            }
                        }
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_header_round_trip(c: &mut Criterion) {
    let router = Router::new("user-events", &RetryPolicy::default()).unwrap();
    let env = RecordEnvelope::new("user-events", Some("42".to_string()), ());
    let retried = match router.route(env, FailureKind::Retryable, "bench") {
        redelivery_core::RouteDecision::Retry { envelope, .. } => envelope,
        redelivery_core::RouteDecision::DeadLetter { envelope } => envelope,
    };
    let headers: Headers = retried.to_headers();
    let now = Utc::now();

    c.bench_function("envelope_from_headers", |b| {
        b.iter(|| {
            let delivery = Delivery {
                topic: "user-events-retry-0",
                partition: 0,
                offset: 7,
                timestamp: now,
                key: Some("42"),
                attempt: 1,
            };
            black_box(RecordEnvelope::from_delivery(delivery, black_box(&headers), ()).unwrap())
        });
    });
}

criterion_group!(benches, bench_route_full_journey, bench_header_round_trip);
criterion_main!(benches);
