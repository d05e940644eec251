use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

use chrono::{Duration, TimeZone, Utc};
use jobkeeper_core::{Job, JobId, RetentionPolicy};
use jobkeeper_infra::jobs::{DurableJobStore, InMemoryBackend, RetentionSweeper};

/// Half the jobs expire, half are still inside their window.
fn fixture(n: usize) -> Vec<Job> {
    let old = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let fresh = old + Duration::days(30);
    (0..n)
        .map(|i| {
            let start = if i % 2 == 0 { old } else { fresh };
            Job::new(JobId::new(format!("job-{i:06}")).unwrap(), format!("Job {i}"))
                .starting_at(start)
                .with_segment(45)
                .with_segment(30)
                .with_delay(5)
        })
        .collect()
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("retention_sweep");
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();

    for n in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || {
                    let store = DurableJobStore::open(InMemoryBackend::with_jobs(fixture(n)));
                    RetentionSweeper::new(store, RetentionPolicy::default())
                },
                |sweeper| black_box(sweeper.sweep_at(now)),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_estimate(c: &mut Criterion) {
    let job = fixture(1).remove(0);
    let policy = RetentionPolicy::default();
    let now = Utc::now();
    c.bench_function("is_expired", |b| {
        b.iter(|| black_box(policy.is_expired(black_box(&job), now)))
    });
}

criterion_group!(benches, bench_sweep, bench_estimate);
criterion_main!(benches);
