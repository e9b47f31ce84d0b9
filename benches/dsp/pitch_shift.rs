//! Benchmarks for the granular pitch shifter.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use tapeworks::dsp::pitch_shift::PitchShifter;

use crate::{test_signal, BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_pitch_shift(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/pitch_shift");

    for &size in BLOCK_SIZES {
        let input = test_signal(size);

        for (name, semitones) in [("octave_up", 12.0), ("octave_down", -12.0)] {
            let mut shifter = PitchShifter::new(SAMPLE_RATE, semitones);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    let mut sum = 0.0f32;
                    for &sample in &input {
                        sum += shifter.process(black_box(sample));
                    }
                    sum
                })
            });
        }
    }

    group.finish();
}
