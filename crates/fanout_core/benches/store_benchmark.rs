//! # Snapshot Store Benchmark
//!
//! Measures retain/release traffic under the store lock, single-threaded and
//! with several client threads hammering the same snapshot.
//!
//! Run with: `cargo bench --package fanout_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fanout_core::{BitWriter, SnapshotFrame, SnapshotStore};
use std::thread;

fn bench_retain_release(c: &mut Criterion) {
    let store = SnapshotStore::new(0);
    let snap = store.create(1, SnapshotFrame::default()).unwrap();

    c.bench_function("retain_release", |b| {
        b.iter(|| {
            let extra = black_box(snap.clone());
            drop(extra);
        });
    });
}

fn bench_contended_replace(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_replace");

    for threads in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            let store = SnapshotStore::new(4);
            let ticks: Vec<_> = (0..4)
                .map(|t| store.publish(t, SnapshotFrame::default()).unwrap())
                .collect();

            b.iter(|| {
                thread::scope(|s| {
                    for _ in 0..threads {
                        s.spawn(|| {
                            let mut slot = None;
                            for snap in &ticks {
                                store.replace(&mut slot, Some(snap));
                            }
                            store.replace(&mut slot, None);
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

fn bench_bit_writer(c: &mut Criterion) {
    let mut writer = BitWriter::new(160_000);

    c.bench_function("bit_writer_4k_fields", |b| {
        b.iter(|| {
            writer.reset();
            for i in 0..4096u32 {
                writer.write_bits(black_box(i), 13);
            }
            writer.bits_written()
        });
    });
}

criterion_group!(benches, bench_retain_release, bench_contended_replace, bench_bit_writer);
criterion_main!(benches);
