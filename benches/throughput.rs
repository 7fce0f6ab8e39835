//! Throughput benchmarks for the Sluice pipeline.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use tokio::runtime::Runtime;

use sluice::pipeline::{Pipeline, PipelineConfig};
use sluice::stage::{accept_fn, convert_fn, generate_fn};

const ITEMS: usize = 1_000;

fn run_pipeline(workers: usize, capacity: usize) -> impl std::future::Future<Output = usize> {
    async move {
        let mut next = -1i64;
        let results = Pipeline::new(
            generate_fn(move || {
                next += 1;
                next
            }),
            convert_fn(|raw: i64| Ok(raw as u64)),
            accept_fn(|_: &u64| true),
        )
        .with_config(
            PipelineConfig::default()
                .with_workers(workers)
                .with_take(ITEMS)
                .with_channel_capacity(capacity),
        )
        .start()
        .collect()
        .await
        .unwrap();
        results.len()
    }
}

fn bench_worker_counts(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("pipeline_throughput");
    group.throughput(Throughput::Elements(ITEMS as u64));

    for workers in [1usize, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("workers", workers),
            &workers,
            |b, &workers| {
                b.to_async(&rt)
                    .iter(|| async move { black_box(run_pipeline(workers, 0).await) });
            },
        );
    }

    group.finish();
}

fn bench_channel_capacity(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("channel_capacity");
    group.throughput(Throughput::Elements(ITEMS as u64));

    for capacity in [0usize, 16, 64] {
        group.bench_with_input(
            BenchmarkId::new("capacity", capacity),
            &capacity,
            |b, &capacity| {
                b.to_async(&rt)
                    .iter(|| async move { black_box(run_pipeline(4, capacity).await) });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_worker_counts, bench_channel_capacity);
criterion_main!(benches);
