//! Granular pitch shifter for feedback paths.

/*
Granular Pitch Shifting
=======================

Playing a recording faster raises its pitch but also shortens it. A delay
line cannot get shorter, so pitch has to change while time stands still.
The trick is to chop the signal into short overlapping grains and play each
one back at the new speed:

    input   ─────────────────────────────────────────→
              └ grain ┘
                  └ grain ┘
                      └ grain ┘          (a new grain every hop)

    each grain reads at `ratio` samples per sample,
    windowed by a Hann bell so its edges are silent

Vocabulary
----------

  grain       50ms of audio read at `ratio` speed.

  hop         Distance between grain starts: grain / 4, so four grains
              overlap at any time (75% overlap).

  ratio       2^(semitones / 12). +12 doubles the frequency, −12 halves it.

  lead        How far behind the write head a grain starts. A fast grain
              gains on the write head by (ratio − 1) samples per sample, so
              it must start at least grain × (ratio − 1) behind or it would
              overtake fresh input.

Overlap-Add Gain
----------------

Four periodic Hann windows spaced a quarter apart sum to exactly 2:

    Σ hann(x + k/4) = 2     for k = 0..3

so the summed grains are scaled by 1/2. With ratio = 1 every grain reads
the same delayed sample and the output equals the input delayed by one.
*/

use crate::dsp::{
    buffer::{wrap, CircularBuffer},
    window::hann,
};

const GRAIN_SECONDS: f32 = 0.05;
const OVERLAP: usize = 4;
const MAX_GRAINS: usize = 8;
const OVERLAP_GAIN: f32 = 1.0 / (OVERLAP as f32 * 0.5);

#[derive(Debug, Clone, Copy, Default)]
struct Grain {
    active: bool,
    position: f64,
    age: usize,
}

#[derive(Debug, Clone)]
pub struct PitchShifter {
    history: CircularBuffer,
    write_pos: usize,
    grains: [Grain; MAX_GRAINS],
    grain_len: usize,
    hop: usize,
    since_spawn: usize,
    ratio: f64,
}

impl PitchShifter {
    pub fn new(sample_rate: f32, semitones: f32) -> Self {
        let grain_len = ((GRAIN_SECONDS * sample_rate) as usize).max(OVERLAP);
        let hop = grain_len / OVERLAP;
        let mut shifter = Self {
            // room for a two-octave-up grain plus its lead
            history: CircularBuffer::new(grain_len * 4 + 4),
            write_pos: 0,
            grains: [Grain::default(); MAX_GRAINS],
            grain_len,
            hop,
            since_spawn: hop,
            ratio: 1.0,
        };
        shifter.set_semitones(semitones);
        shifter
    }

    /// Shift amount, clamped to two octaves either way.
    pub fn set_semitones(&mut self, semitones: f32) {
        if semitones.is_finite() {
            let st = semitones.clamp(-24.0, 24.0) as f64;
            self.ratio = (st / 12.0).exp2();
        }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let capacity = self.history.capacity();
        self.history.write(self.write_pos, input);

        if self.since_spawn >= self.hop {
            self.since_spawn = 0;
            self.spawn(capacity);
        }
        self.since_spawn += 1;

        let mut out = 0.0;
        let grain_len = self.grain_len as f32;
        for grain in self.grains.iter_mut().filter(|g| g.active) {
            let gain = hann(grain.age as f32 / grain_len);
            out += self.history.read_interpolated(grain.position, capacity) * gain;

            grain.position += self.ratio;
            grain.age += 1;
            if grain.age >= self.grain_len {
                grain.active = false;
            }
        }

        self.write_pos = (self.write_pos + 1) % capacity;
        out * OVERLAP_GAIN
    }

    fn spawn(&mut self, capacity: usize) {
        let Some(slot) = self.grains.iter_mut().find(|g| !g.active) else {
            return;
        };
        let lead = (self.grain_len as f64 * (self.ratio - 1.0)).max(0.0) + 1.0;
        *slot = Grain {
            active: true,
            position: wrap(self.write_pos as f64 - lead, capacity as f64),
            age: 0,
        };
    }

    pub fn active_grains(&self) -> usize {
        self.grains.iter().filter(|g| g.active).count()
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.grains = [Grain::default(); MAX_GRAINS];
        self.write_pos = 0;
        self.since_spawn = self.hop;
    }
}
