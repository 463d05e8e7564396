use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use kolom::{
    Table, TableConfig,
    utils::mock::{TempSnapshot, sample_row, sample_table},
};
use std::{hint::black_box, time::Instant};

const DATASET_SIZES: &[i64] = &[1_000, 10_000, 50_000];
const COLUMN_COUNTS: &[usize] = &[2, 5, 16];
const UPDATE_ROUNDS: &[i64] = &[1, 4, 16];

fn benchmark_insert_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_throughput");
    for &size in DATASET_SIZES {
        for &columns in COLUMN_COUNTS {
            let benchmark_id = BenchmarkId::from_parameter(format!("{}rows_{}cols", size, columns));
            group.throughput(Throughput::Elements(size as u64));
            group.bench_with_input(benchmark_id, &(size, columns), |b, &(size, columns)| {
                b.iter_custom(|iters| {
                    let mut total_duration = std::time::Duration::new(0, 0);
                    for _ in 0..iters {
                        let table = Table::with_config("bench", columns, 0, TableConfig::manual()).unwrap();
                        let rows: Vec<Vec<i64>> = (1..=size).map(|key| sample_row(key, columns)).collect();
                        let start = Instant::now();
                        for row in &rows {
                            black_box(table.insert(row).unwrap());
                        }
                        total_duration += start.elapsed();
                    }
                    total_duration
                });
            });
        }
    }
    group.finish();
}

fn benchmark_read_after_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_after_updates");
    for &rounds in UPDATE_ROUNDS {
        let (table, rids) = sample_table(5, 10_000, TableConfig::manual()).unwrap();
        for round in 0..rounds {
            for rid in &rids {
                table.update(*rid, &[None, Some(round), None, None, Some(-round)]).unwrap();
            }
        }
        group.throughput(Throughput::Elements(rids.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rounds), &rounds, |b, _| {
            b.iter(|| {
                for rid in &rids {
                    black_box(table.read(*rid, &[1, 4]).unwrap());
                }
            });
        });
    }
    group.finish();
}

fn benchmark_update_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_throughput");
    for &size in DATASET_SIZES {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_custom(|iters| {
                let mut total_duration = std::time::Duration::new(0, 0);
                for _ in 0..iters {
                    let (table, rids) = sample_table(5, size, TableConfig::manual()).unwrap();
                    let start = Instant::now();
                    for (i, rid) in rids.iter().enumerate() {
                        table.update(*rid, &[None, None, Some(i as i64), None, None]).unwrap();
                    }
                    total_duration += start.elapsed();
                }
                total_duration
            });
        });
    }
    group.finish();
}

fn benchmark_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    group.sample_size(20);
    for &rounds in UPDATE_ROUNDS {
        group.bench_with_input(BenchmarkId::from_parameter(rounds), &rounds, |b, &rounds| {
            b.iter_custom(|iters| {
                let mut total_duration = std::time::Duration::new(0, 0);
                for _ in 0..iters {
                    let (table, rids) = sample_table(5, 8_000, TableConfig::manual()).unwrap();
                    for round in 0..rounds {
                        for rid in &rids {
                            table.update(*rid, &[None, Some(round), None, None, None]).unwrap();
                        }
                    }
                    let start = Instant::now();
                    let outcomes = black_box(table.merge_all().unwrap());
                    total_duration += start.elapsed();
                    assert!(outcomes.iter().all(|outcome| outcome.is_merged()));
                }
                total_duration
            });
        });
    }
    group.finish();
}

fn benchmark_snapshot_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_roundtrip");
    group.sample_size(10);
    for &size in DATASET_SIZES {
        let (table, _) = sample_table(5, size, TableConfig::manual()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let snapshot = TempSnapshot::with_prefix("bench_snapshot").unwrap();
                table.save(&snapshot.path).unwrap();
                let restored = Table::load(&snapshot.path).unwrap();
                assert_eq!(restored.len(), size as usize);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_insert_throughput,
    benchmark_read_after_updates,
    benchmark_update_throughput,
    benchmark_merge,
    benchmark_snapshot_roundtrip
);
criterion_main!(benches);
