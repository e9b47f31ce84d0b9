//! Benchmarks for circular buffer reads.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use tapeworks::dsp::CircularBuffer;

use crate::{test_signal, BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/buffer");

    // Ten seconds of material, like a short loop
    let len = (SAMPLE_RATE * 10.0) as usize;
    let mut buffer = CircularBuffer::new(len);
    for (i, s) in test_signal(len).into_iter().enumerate() {
        buffer.write(i, s);
    }

    for &size in BLOCK_SIZES {
        // Varispeed read, crossing the wrap point
        let mut position = len as f64 - size as f64 * 0.5;
        group.bench_with_input(BenchmarkId::new("interpolated", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for _ in 0..size {
                    sum += buffer.read_interpolated(black_box(position), len);
                    position = (position + 0.793) % len as f64;
                }
                sum
            })
        });

        // Region read as used by grains and loop windows
        let mut offset = 0.0f64;
        group.bench_with_input(BenchmarkId::new("region", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for _ in 0..size {
                    sum += buffer.read_region(black_box(12_000), black_box(24_000), offset);
                    offset = (offset + 1.5) % 24_000.0;
                }
                sum
            })
        });
    }

    group.finish();
}
