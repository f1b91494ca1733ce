use core::hint::black_box;
use core::time::Duration;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use restq::{Coordinator, Value, WaitOutcome};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};
use tokio::runtime::Builder;

// Number of values moved through the coordinator per benchmark iteration
// (per-thread for multi-threaded).
const TOTAL_VALUES: usize = 4096;

/// Buffered path: enqueue everything, then drain it.
fn bench_buffered(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffered");
    group.throughput(Throughput::Elements(TOTAL_VALUES as u64));

    let value = Value::from_static(b"payload");
    group.bench_function(format!("elems/{TOTAL_VALUES}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let coordinator = Coordinator::new();
                for _ in 0..TOTAL_VALUES {
                    black_box(coordinator.enqueue("bench", value.clone()));
                }
                for _ in 0..TOTAL_VALUES {
                    black_box(coordinator.try_dequeue("bench"));
                }
            }
            start.elapsed()
        });
    });
    group.finish();
}

/// Contended path: several threads enqueue and dequeue on the same queue.
fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    for threads in [2, 4, 8] {
        group.throughput(Throughput::Elements((TOTAL_VALUES * threads) as u64));
        group.bench_function(format!("threads/{threads}"), |b| {
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let coordinator = Coordinator::new();
                    let barrier = Arc::new(Barrier::new(threads + 1));
                    let elapsed = scope(|s| {
                        for _ in 0..threads {
                            let coordinator = &coordinator;
                            let barrier = Arc::clone(&barrier);
                            s.spawn(move || {
                                barrier.wait();
                                for _ in 0..TOTAL_VALUES {
                                    coordinator.enqueue("bench", Value::from_static(b"v"));
                                    black_box(coordinator.try_dequeue("bench"));
                                }
                            });
                        }
                        barrier.wait();
                        Instant::now()
                    })
                    .elapsed();
                    total += elapsed;
                }
                total
            });
        });
    }
    group.finish();
}

/// Hand-off path: parked async waiters fulfilled by a producer.
fn bench_hand_off(c: &mut Criterion) {
    let runtime = Builder::new_multi_thread().enable_all().build().unwrap();
    let mut group = c.benchmark_group("hand_off");
    const WAITERS: usize = 256;
    group.throughput(Throughput::Elements(WAITERS as u64));

    group.bench_function(format!("waiters/{WAITERS}"), |b| {
        b.to_async(&runtime).iter(|| async {
            let coordinator = Coordinator::new();
            let consumers: Vec<_> = (0..WAITERS)
                .map(|_| {
                    let coordinator = coordinator.clone();
                    tokio::spawn(async move {
                        coordinator
                            .dequeue("bench", Some(Duration::from_secs(5)), None)
                            .await
                    })
                })
                .collect();
            for _ in 0..WAITERS {
                coordinator.enqueue("bench", Value::from_static(b"v"));
            }
            for consumer in consumers {
                let outcome = consumer.await.unwrap();
                debug_assert!(matches!(outcome, WaitOutcome::Fulfilled(_)));
                black_box(outcome);
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_buffered, bench_contended, bench_hand_off);
criterion_main!(benches);
