//! Micro-benchmarks for the write buffer's core operations.
//!
//! Uses Criterion for statistically rigorous measurement with regression
//! detection and HTML reports.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench micro              # run all micro-benchmarks
//! cargo bench --bench micro -- mutate    # filter by name
//! ```
//!
//! Reports are generated in `target/criterion/report/index.html`.

use criterion::{
    BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};

use std::sync::Arc;

use tabula::buffer::WriteBuffer;
use tabula::data::{Key, Mutation};
use tabula::scan::{RangeScanner, ScanRange};

// ------------------------------------------------------------------------------------------------
// Helpers
// ------------------------------------------------------------------------------------------------

/// Default value payload for benchmarks (128 bytes).
const VALUE_128B: &[u8; 128] = &[0xAB; 128];

/// Format a zero-padded row.
fn make_row(i: u64) -> Vec<u8> {
    format!("row-{i:012}").into_bytes()
}

/// Single-column mutation on `row` with the default payload.
fn make_mutation(row: &[u8], value: &[u8]) -> Mutation {
    let mut m = Mutation::new(row.to_vec());
    m.put(b"cf".to_vec(), b"cq".to_vec(), b"".to_vec(), 1, value.to_vec());
    m
}

/// The exact key `make_mutation` produces for `row` under `count`.
fn make_key(row: &[u8], count: u32) -> Key {
    Key::new(row.to_vec(), b"cf".to_vec(), b"cq".to_vec(), b"".to_vec(), 1, false)
        .with_count(count)
}

/// Buffer pre-populated with `n` sequential rows, counts `0..n`.
fn populate(n: u64) -> WriteBuffer {
    let buffer = WriteBuffer::new();
    let mutations: Vec<_> = (0..n).map(|i| make_mutation(&make_row(i), VALUE_128B)).collect();
    buffer.mutate(&mutations, 0).unwrap();
    buffer
}

// ================================================================================================
// Write benchmarks
// ================================================================================================

/// Benchmark group for mutation application.
///
/// ## `single`
///
/// **Scenario:** Applies one single-column mutation per iteration, each
/// under a fresh row and count.
///
/// **What it measures:** The raw cost of one write event: exclusive lock,
/// tree insert, counter bump.
///
/// ## `bulk/100`
///
/// **Scenario:** Applies a reused batch of 100 single-column mutations
/// per iteration with a fixed starting count, so every iteration after
/// the first overwrites in place.
///
/// **What it measures:** Bulk throughput including the periodic
/// release-and-reacquire of the exclusive lock every ten updates.
fn bench_mutate(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutate");

    group.bench_function("single", |b| {
        let buffer = WriteBuffer::new();
        let mut seq = 0u64;

        b.iter(|| {
            let m = make_mutation(&make_row(seq), VALUE_128B);
            buffer.put(black_box(&m), seq as u32).unwrap();
            seq += 1;
        });

        buffer.close().unwrap();
    });

    group.throughput(Throughput::Elements(100));
    group.bench_function(BenchmarkId::new("bulk", 100), |b| {
        let buffer = WriteBuffer::new();
        let mutations: Vec<_> = (0..100u64)
            .map(|i| make_mutation(&make_row(i), VALUE_128B))
            .collect();

        b.iter(|| {
            buffer.mutate(black_box(&mutations), 0).unwrap();
        });

        buffer.close().unwrap();
    });

    group.finish();
}

// ================================================================================================
// Read benchmarks
// ================================================================================================

/// Benchmark group for exact-key lookups.
///
/// ## `hit`
///
/// **Scenario:** Reads round-robin from 10,000 resident cells.
///
/// **What it measures:** Shared-lock acquisition plus one tree lookup and
/// a value copy; the fastest read path.
///
/// ## `miss`
///
/// **Scenario:** Reads keys that were never inserted.
///
/// **What it measures:** The negative-lookup path. Comparable to a hit,
/// without the value copy.
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    let n = 10_000u64;
    let buffer = populate(n);

    group.bench_function("hit", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = make_key(&make_row(i % n), (i % n) as u32);
            let _ = black_box(buffer.get(black_box(&key)).unwrap());
            i += 1;
        });
    });

    group.bench_function("miss", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = make_key(&make_row(n + i), 0);
            let _ = black_box(buffer.get(black_box(&key)).unwrap());
            i += 1;
        });
    });

    buffer.close().unwrap();
    group.finish();
}

// ================================================================================================
// Scan benchmarks
// ================================================================================================

/// Benchmark group for range scans over a 10,000-cell buffer.
///
/// ## `rows/{10,100,1000}`
///
/// **Scenario:** Seeks a row interval of N rows and drains it.
///
/// **What it measures:** Batched read-ahead efficiency: per-entry cost
/// should fall as the adaptive batch reaches its ceiling, then stay flat.
fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    let n = 10_000u64;
    let buffer = populate(n);

    for &range_size in &[10u64, 100, 1000] {
        group.throughput(Throughput::Elements(range_size));
        group.bench_function(BenchmarkId::new("rows", range_size), |b| {
            let mut offset = 0u64;
            b.iter(|| {
                let base = offset % (n - range_size);
                let range =
                    ScanRange::rows(make_row(base), make_row(base + range_size)).unwrap();

                let mut scanner = RangeScanner::new(&buffer);
                scanner.seek(black_box(range), &[], false).unwrap();
                let mut seen = 0u64;
                while scanner.has_top() {
                    seen += 1;
                    scanner.next().unwrap();
                }
                black_box(seen);
                offset += 1;
            });
        });
    }

    buffer.close().unwrap();
    group.finish();
}

// ================================================================================================
// Concurrent access benchmarks
// ================================================================================================

/// Benchmark group for scans under concurrent access.
///
/// ## `readers/{1,2,4}`
///
/// **Scenario:** N threads each drain a 1,000-row interval of a shared
/// buffer.
///
/// **What it measures:** Shared-lock scaling of the batched refill path.
/// Readers contend only during refills, so throughput should scale close
/// to linearly.
///
/// ## `scan_under_writes`
///
/// **Scenario:** One thread drains a 1,000-row interval while a writer
/// inserts 500 fresh rows.
///
/// **What it measures:** The cost of concurrent-modification recovery:
/// every refill that races a write re-seeks the raw cursor.
fn bench_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");
    group.sample_size(10);

    let n = 10_000u64;

    for &num_readers in &[1u32, 2, 4] {
        group.bench_function(BenchmarkId::new("readers", num_readers), |b| {
            let buffer = Arc::new(populate(n));
            b.iter(|| {
                let mut handles = Vec::new();
                for t in 0..num_readers {
                    let buffer = Arc::clone(&buffer);
                    handles.push(std::thread::spawn(move || {
                        let base = u64::from(t) * 1_000;
                        let range =
                            ScanRange::rows(make_row(base), make_row(base + 1_000)).unwrap();
                        let mut scanner = RangeScanner::new(&buffer);
                        scanner.seek(range, &[], false).unwrap();
                        let mut seen = 0u64;
                        while scanner.has_top() {
                            seen += 1;
                            scanner.next().unwrap();
                        }
                        seen
                    }));
                }
                for handle in handles {
                    black_box(handle.join().unwrap());
                }
            });
        });
    }

    group.bench_function("scan_under_writes", |b| {
        let buffer = Arc::new(populate(n));
        let mut round = 0u32;
        b.iter(|| {
            let writer = {
                let buffer = Arc::clone(&buffer);
                let base = u64::from(round) * 500;
                std::thread::spawn(move || {
                    for i in 0..500u64 {
                        let m = make_mutation(&make_row(n + base + i), VALUE_128B);
                        buffer.put(&m, (n + base + i) as u32).unwrap();
                    }
                })
            };

            let range = ScanRange::rows(make_row(0), make_row(1_000)).unwrap();
            let mut scanner = RangeScanner::new(&buffer);
            scanner.seek(range, &[], false).unwrap();
            let mut seen = 0u64;
            while scanner.has_top() {
                seen += 1;
                scanner.next().unwrap();
            }
            black_box(seen);

            writer.join().unwrap();
            round += 1;
        });
    });

    group.finish();
}

// ================================================================================================
// Group registration
// ================================================================================================

criterion_group!(benches, bench_mutate, bench_get, bench_scan, bench_concurrent);

criterion_main!(benches);
