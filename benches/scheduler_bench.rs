//! Throughput benchmarks for the seed-scheduling core: growing the corpus
//! via `push`, and draining it via `next`, under both the pure Pareto path
//! and the vertical-manager-enabled path.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dafl_sched::{ProxScore, Scheduler, SchedulerConfig, Seed, SeedHandle};

fn make_seed(id: u64) -> SeedHandle {
    let dfg = (id % 64) as u32;
    let covered = (id % 32) as u32;
    let location = ((id * 2654435761) % 1024) as u32;
    Seed::new(id, 128, id as u32, dfg, (id * 31) as u32, ProxScore::new(id % 500 + 1, covered), location)
        .into_handle()
}

fn push_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("push");
    for size in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut sched = Scheduler::new(SchedulerConfig::default()).unwrap();
                for id in 0..size as u64 {
                    sched.push(make_seed(id));
                }
            });
        });
    }
    group.finish();
}

fn next_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("next");
    for (label, cfg) in [
        ("horizontal_only", SchedulerConfig::horizontal_only()),
        ("vertical_enabled", SchedulerConfig::default()),
    ] {
        group.bench_function(label, |b| {
            b.iter_batched(
                || {
                    let mut sched = Scheduler::new(cfg.clone()).unwrap();
                    for id in 0..5_000u64 {
                        sched.push(make_seed(id));
                    }
                    sched
                },
                |mut sched| {
                    for _ in 0..5_000 {
                        sched.next();
                    }
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, push_throughput, next_throughput);
criterion_main!(benches);
