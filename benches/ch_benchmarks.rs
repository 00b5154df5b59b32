//! Benchmarks for the Counter Hierarchy itself: raw update/read costs
//! independent of any sketch built on top of it.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sketch_oxide::ch::CounterHierarchy;
use sketch_oxide::common::ChConfig;

fn two_layer_config() -> ChConfig {
    ChConfig {
        width_cnt: vec![16, 32],
        no_hash: vec![0, 2],
        ..ChConfig::default()
    }
}

fn bench_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("ch_construction");

    for &n in &[1_000u64, 100_000, 1_000_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let ch = CounterHierarchy::new(n, two_layer_config()).unwrap();
                black_box(ch);
            });
        });
    }

    group.finish();
}

fn bench_update_cnt(c: &mut Criterion) {
    let mut group = c.benchmark_group("ch_update_cnt");
    group.throughput(Throughput::Elements(1));

    let mut ch = CounterHierarchy::new(1_000_000, two_layer_config()).unwrap();
    let mut i = 0u64;
    group.bench_function("single_layer0_increment", |b| {
        b.iter(|| {
            ch.update_cnt((i % 1_000_000) as usize, 1).unwrap();
            i = i.wrapping_add(1);
        });
    });

    group.finish();
}

fn bench_get_original_cnt(c: &mut Criterion) {
    let mut group = c.benchmark_group("ch_get_original_cnt");
    group.throughput(Throughput::Elements(1));

    let mut ch = CounterHierarchy::new(1_000_000, two_layer_config()).unwrap();
    for i in 0..1_000_000 {
        ch.update_cnt(i, 3).unwrap();
    }

    let mut i = 0usize;
    group.bench_function("truncated_read", |b| {
        b.iter(|| {
            let v = ch.get_original_cnt(i % 1_000_000);
            i = i.wrapping_add(1);
            black_box(v);
        });
    });

    group.finish();
}

fn bench_get_cnt(c: &mut Criterion) {
    let mut group = c.benchmark_group("ch_get_cnt");
    group.throughput(Throughput::Elements(1));

    let mut ch = CounterHierarchy::new(10_000, two_layer_config()).unwrap();
    for i in 0..10_000 {
        ch.update_cnt(i, 100).unwrap();
    }

    let mut i = 0usize;
    group.bench_function("full_decode", |b| {
        b.iter(|| {
            let v = ch.get_cnt(i % 10_000);
            i = i.wrapping_add(1);
            black_box(v);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_construction,
    bench_update_cnt,
    bench_get_original_cnt,
    bench_get_cnt,
);
criterion_main!(benches);
