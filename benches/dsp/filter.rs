//! Benchmarks for biquad and one-pole filters.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use tapeworks::dsp::filter::{Biquad, OnePole};

use crate::{test_signal, BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");

    for &size in BLOCK_SIZES {
        let input = test_signal(size);
        let mut buffer = input.clone();

        // Lowpass biquad
        let mut filter = Biquad::lowpass(SAMPLE_RATE, 1000.0, 0.707);
        group.bench_with_input(BenchmarkId::new("lowpass", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                for sample in buffer.iter_mut() {
                    *sample = filter.process(black_box(*sample));
                }
            })
        });

        // Highpass biquad
        let mut filter = Biquad::highpass(SAMPLE_RATE, 200.0, 0.707);
        group.bench_with_input(BenchmarkId::new("highpass", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                for sample in buffer.iter_mut() {
                    *sample = filter.process(black_box(*sample));
                }
            })
        });

        // One-pole, as used by the tape coloration
        let mut filter = OnePole::new();
        let coeff = OnePole::coefficient(SAMPLE_RATE, 6000.0);
        group.bench_with_input(BenchmarkId::new("one_pole", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                for sample in buffer.iter_mut() {
                    *sample = filter.process(black_box(*sample), coeff);
                }
            })
        });
    }

    group.finish();
}
