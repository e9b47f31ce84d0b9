//! Benchmarks for the four effect units.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use tapeworks::{
    control::{Deck, Discard},
    engine::{Databender, Engine, Lubadh, LubadhCommand, Morphagene, Nautilus},
    io::{AudioInput, AudioOutput},
    preset::Preset,
    EngineConfig,
};

use crate::{test_signal, BLOCK_SIZES, SAMPLE_RATE};

fn config() -> EngineConfig {
    EngineConfig::default()
        .with_sample_rate(SAMPLE_RATE)
        .with_seed(7)
}

/// Run `engine` on a looping test signal, one block per iteration.
fn bench_engine<E: Engine>(c: &mut Criterion, name: &str, mut engine: E) {
    let mut group = c.benchmark_group("scenarios/engines");

    for &size in BLOCK_SIZES {
        let input = test_signal(size);
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];
        let mut events = Discard;

        group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
            b.iter(|| {
                let audio_in = AudioInput::mono(&input);
                let mut audio_out = AudioOutput::new(&mut left, &mut right);
                engine.process(black_box(&audio_in), &mut audio_out, &mut events);
            })
        });
    }

    group.finish();
}

pub fn bench_engines(c: &mut Criterion) {
    let config = config();
    let two_seconds = test_signal(2 * SAMPLE_RATE as usize);

    // Micro mode with crushing and repeats: the busiest path.
    if let Ok(mut databender) = Databender::new(&config) {
        let preset = Preset::new(databender.kind())
            .with_mode("operation_mode", "micro")
            .with_mode("corrupt_type", "decimate")
            .with_param("corrupt", 0.7)
            .with_param("repeats", 0.8)
            .with_param("bend", 0.5)
            .with_param("mix", 1.0);
        if databender.load_preset(&preset).is_ok() {
            bench_engine(c, "databender", databender);
        }
    }

    // Four overlapping grains over a loaded reel
    if let Ok(mut morphagene) = Morphagene::new(&config) {
        let preset = Preset::new(morphagene.kind())
            .with_param("morph", 0.9)
            .with_param("gene_size", 0.6)
            .with_param("mix", 1.0);
        let loaded = morphagene
            .load_reel(&two_seconds, &[], &[SAMPLE_RATE as usize])
            .and_then(|_| morphagene.load_preset(&preset));
        if loaded.is_ok() {
            bench_engine(c, "morphagene", morphagene);
        }
    }

    // All eight lines, shimmer and reverb
    if let Ok(mut nautilus) = Nautilus::new(&config) {
        let preset = Preset::new(nautilus.kind())
            .with_mode("delay_mode", "shimmer")
            .with_mode("feedback_mode", "ping_pong")
            .with_param("sensors", 1.0)
            .with_param("feedback", 0.7)
            .with_param("reverb", 0.5)
            .with_param("mix", 1.0);
        if nautilus.load_preset(&preset).is_ok() {
            bench_engine(c, "nautilus", nautilus);
        }
    }

    // Both decks playing with extra taps and tape coloration
    if let Ok(mut lubadh) = Lubadh::new(&config) {
        let preset = Preset::new(lubadh.kind())
            .with_param("tape", 0.6)
            .with_param("speed_b", 0.6);
        let loaded = lubadh
            .load_deck(Deck::A, &two_seconds)
            .and_then(|_| lubadh.load_deck(Deck::B, &two_seconds))
            .and_then(|_| lubadh.load_preset(&preset));
        if loaded.is_ok() {
            for deck in Deck::BOTH {
                lubadh.apply(LubadhCommand::AddTap {
                    deck,
                    offset: 0.25,
                    ratio: 0.5,
                });
                lubadh.apply(LubadhCommand::AddTap {
                    deck,
                    offset: 0.5,
                    ratio: 2.0,
                });
            }
            bench_engine(c, "lubadh", lubadh);
        }
    }
}
