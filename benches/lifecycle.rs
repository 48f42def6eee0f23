//! Benchmarks for Brainy database lifecycle operations.
//!
//! Run with: `cargo bench`
//!
//! Performance targets:
//! - `open()` < 100ms for new database
//! - `open()` < 100ms for existing database with 100K nouns
//! - `shut_down()` < 50ms

use brainy_db::{BrainyDb, Config};
use criterion::{criterion_group, criterion_main, Criterion};
use tempfile::tempdir;

/// Benchmark opening a new database.
fn bench_open_new(c: &mut Criterion) {
    c.bench_function("open_new_database", |b| {
        b.iter_custom(|iters| {
            let mut total = std::time::Duration::ZERO;

            for _ in 0..iters {
                let dir = tempdir().unwrap();
                let path = dir.path().join("test.db");

                let start = std::time::Instant::now();
                let db = BrainyDb::open(&path, Config::default()).unwrap();
                total += start.elapsed();

                db.shut_down().unwrap();
            }

            total
        });
    });
}

/// Benchmark opening an existing database.
fn bench_open_existing(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    // Create database first
    let db = BrainyDb::open(&path, Config::default()).unwrap();
    db.shut_down().unwrap();

    c.bench_function("open_existing_database", |b| {
        b.iter(|| {
            let db = BrainyDb::open(&path, Config::default()).unwrap();
            db.shut_down().unwrap();
        });
    });
}

/// Benchmark shutting down a database.
fn bench_shut_down(c: &mut Criterion) {
    c.bench_function("shut_down_database", |b| {
        b.iter_custom(|iters| {
            let mut total = std::time::Duration::ZERO;

            for _ in 0..iters {
                let dir = tempdir().unwrap();
                let path = dir.path().join("test.db");

                let db = BrainyDb::open(&path, Config::default()).unwrap();

                let start = std::time::Instant::now();
                db.shut_down().unwrap();
                total += start.elapsed();
            }

            total
        });
    });
}

criterion_group!(benches, bench_open_new, bench_open_existing, bench_shut_down);
criterion_main!(benches);
