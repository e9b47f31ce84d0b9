//! Benchmarks for reverb processing.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use tapeworks::dsp::reverb::{ReverbPreset, StereoReverb};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_reverb(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/reverb");

    for &size in BLOCK_SIZES {
        // Impulse followed by a quiet tail
        let input: Vec<f32> = (0..size)
            .map(|i| {
                if i < 10 {
                    1.0 - (i as f32 / 10.0)
                } else {
                    (i as f32 * 0.05).sin() * 0.1
                }
            })
            .collect();

        for &preset in ReverbPreset::ALL {
            let mut reverb = StereoReverb::new(SAMPLE_RATE);
            reverb.set_preset(preset);
            group.bench_with_input(BenchmarkId::new(preset.name(), size), &size, |b, _| {
                b.iter(|| {
                    let mut sum = 0.0f32;
                    for &sample in &input {
                        let (l, r) = reverb.process(black_box(sample), black_box(-sample));
                        sum += l + r;
                    }
                    sum
                })
            });
        }
    }

    group.finish();
}
