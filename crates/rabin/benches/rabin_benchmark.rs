//! crates/rabin/benches/rabin_benchmark.rs
//!
//! Benchmarks for window hashing and rolling throughput.
//!
//! Run with: `cargo bench -p rabin`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::Rng;

use rabin::{rabin_hash, RabinWindow, RABIN_WINDOW};

fn generate_random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut data = vec![0u8; size];
    rng.fill(&mut data[..]);
    data
}

/// Hash every window position from scratch.
fn bench_fresh_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("rabin_fresh");
    let data = generate_random_data(64 * 1024);

    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("hash_every_window", |b| {
        b.iter(|| {
            let mut acc = 0u32;
            for start in 0..=data.len() - RABIN_WINDOW {
                acc ^= rabin_hash(black_box(&data[start..]));
            }
            black_box(acc)
        });
    });

    group.finish();
}

/// Roll a single window across the buffer.
fn bench_rolling(c: &mut Criterion) {
    let mut group = c.benchmark_group("rabin_roll");
    let data = generate_random_data(64 * 1024);

    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("roll_across_buffer", |b| {
        b.iter(|| {
            let mut window = RabinWindow::new(black_box(&data));
            let mut acc = window.hash();
            for &byte in &data[RABIN_WINDOW..] {
                window.roll(byte);
                acc ^= window.hash();
            }
            black_box(acc)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_fresh_hashing, bench_rolling);
criterion_main!(benches);
