//! Contention benchmarks for the commit path.
//!
//! ## Conflict Shapes
//!
//! - `same_ref`: all threads race on one ref (worst case, every commit
//!   validates against a moving target)
//! - `disjoint_refs`: each thread owns its ref (best case, validation
//!   never fails)
//!
//! ## Running
//!
//! ```bash
//! cargo bench --bench contention
//! cargo bench --bench contention -- "same_ref"  # specific group
//! ```

use atomo::prelude::*;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::{Arc, Barrier};
use std::thread;

/// Run `threads` workers, each committing `per_thread` increments built by
/// `target`, and wait for all of them.
fn run_racers(
    space: &Atomo,
    refs: &[TRef<i64>],
    threads: usize,
    per_thread: usize,
    shared: bool,
) {
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let space = space.clone();
            let cell = if shared { refs[0] } else { refs[i] };
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..per_thread {
                    let tx: Tx<(), &str> = cell.update(|n| n + 1);
                    space.commit(&tx).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

fn bench_single_thread_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_single_thread");
    group.throughput(Throughput::Elements(1));

    let space = Atomo::new();
    let cell = space.new_ref(0i64);

    group.bench_function("read_only", |b| {
        let tx: Tx<i64, &str> = cell.read();
        b.iter(|| space.commit(&tx).unwrap())
    });

    group.bench_function("read_modify_write", |b| {
        let tx: Tx<(), &str> = cell.update(|n| n + 1);
        b.iter(|| space.commit(&tx).unwrap())
    });

    group.finish();
}

fn bench_contention_shapes(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_contention");
    let per_thread = 200;

    for threads in [2usize, 4, 8] {
        group.throughput(Throughput::Elements((threads * per_thread) as u64));

        group.bench_with_input(
            BenchmarkId::new("same_ref", threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let space = Atomo::new();
                    let refs = vec![space.new_ref(0i64)];
                    run_racers(&space, &refs, threads, per_thread, true);
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("disjoint_refs", threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let space = Atomo::new();
                    let refs: Vec<_> = (0..threads).map(|_| space.new_ref(0i64)).collect();
                    run_racers(&space, &refs, threads, per_thread, false);
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_single_thread_commit, bench_contention_shapes);
criterion_main!(benches);
