//! Benchmarks for the grain envelope.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use tapeworks::dsp::GrainEnvelope;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/envelope");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // Short grains: retriggered every block, mostly attack and release
        let mut env = GrainEnvelope::from_seconds(SAMPLE_RATE, 0.001, 0.001);
        group.bench_with_input(BenchmarkId::new("retrigger", size), &size, |b, _| {
            b.iter(|| {
                env.trigger();
                for (i, sample) in buffer.iter_mut().enumerate() {
                    if i == size / 2 {
                        env.release();
                    }
                    *sample = env.next();
                }
                black_box(&buffer);
            })
        });

        // Long grain holding at sustain
        let mut env = GrainEnvelope::from_seconds(SAMPLE_RATE, 0.001, 0.05);
        env.trigger();
        for _ in 0..200 {
            env.next();
        }
        group.bench_with_input(BenchmarkId::new("sustain", size), &size, |b, _| {
            b.iter(|| {
                for sample in buffer.iter_mut() {
                    *sample = env.next();
                }
                black_box(&buffer);
            })
        });
    }

    group.finish();
}
