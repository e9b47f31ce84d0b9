//! Benchmarks for waveshapers and the quantizer.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use tapeworks::dsp::distortion;

use crate::{test_signal, BLOCK_SIZES};

pub fn bench_distortion(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/distortion");

    for &size in BLOCK_SIZES {
        let input = test_signal(size);
        let mut buffer = input.clone();

        // Tape-style asymmetric saturation
        group.bench_with_input(BenchmarkId::new("asymmetric", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                for sample in buffer.iter_mut() {
                    *sample = distortion::asymmetric_saturate(*sample, black_box(3.0), 0.2);
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("sine_fold", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                for sample in buffer.iter_mut() {
                    *sample = distortion::sine_fold(*sample, black_box(4.0));
                }
            })
        });

        // 2-bit crush, the harshest setting
        group.bench_with_input(BenchmarkId::new("quantize", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                for sample in buffer.iter_mut() {
                    *sample = distortion::quantize(*sample, black_box(2));
                }
            })
        });
    }

    group.finish();
}
