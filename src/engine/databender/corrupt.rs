//! The five corruption stages applied to the wet signal.

/*
Corruption
==========

One stage runs at a time, chosen by `CorruptType`, and one amount drives
it. Left and right share the amount but keep separate filter memory.

  decimate    bit depth and sample-rate reduction from a fixed preset table:

                amount   0    .125  .25  .375  .5   .625  .75  .875
                bits     16   12    10   8     6    4     3    2
                hold     1    2     4    8     16   32    64   128

              The hold grid is aligned to the sample clock, so at the last
              preset only every 128th input sample is ever heard.

  dropout     random silence runs. More amount: more often, but shorter.

  destroy     below 0.5 a tanh saturator with rising drive; from 0.5 a
              hard clipper with a cubic term mixed in.

  dj filter   one resonant biquad. Below 0.5 it is a lowpass closing
              towards 200Hz, above 0.5 a highpass opening towards 8kHz.
              Exactly 0.5 is flat.

  vinyl sim   hiss, crackle with exponential decay, and a darkening lowpass,
              all scaled by amount. Wow and flutter phases keep running but
              are not applied to the audio.

An amount of exactly zero bypasses every stage.
*/

use crate::{
    control::params::mode_enum,
    dsp::{
        distortion::{hard_clip, quantize, tanh_saturate},
        filter::{Biquad, FilterType, OnePole},
        lfo::Phasor,
        Random,
    },
};

mode_enum! {
    pub enum CorruptType ("corrupt_type") {
        Decimate => "decimate",
        Dropout => "dropout",
        Destroy => "destroy",
        DjFilter => "dj_filter",
        VinylSim => "vinyl_sim",
    }
    default Decimate
}

/// `(bits, hold)` per decimate step.
pub const DECIMATE_PRESETS: [(u32, u64); 8] = [
    (16, 1),
    (12, 2),
    (10, 4),
    (8, 8),
    (6, 16),
    (4, 32),
    (3, 64),
    (2, 128),
];

pub fn decimate_preset(amount: f32) -> (u32, u64) {
    let index = ((amount.clamp(0.0, 1.0) * 8.0).floor() as usize).min(7);
    DECIMATE_PRESETS[index]
}

const DJ_DEAD_ZONE: f32 = 0.02;
const DJ_LOWPASS_FLOOR: f32 = 200.0;
const DJ_HIGHPASS_CEILING: f32 = 8_000.0;

#[derive(Debug, Clone)]
pub struct Corruptor {
    sample_rate: f32,

    // decimate
    clock: u64,
    held: [f32; 2],

    // dropout
    dropout_remaining: usize,
    dropout_gain: f32,

    // dj filter
    dj: [Biquad; 2],
    dj_amount: f32,

    // vinyl
    wow: Phasor,
    flutter: Phasor,
    crackle: f32,
    darken: [OnePole; 2],
}

impl Corruptor {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            clock: 0,
            held: [0.0; 2],
            dropout_remaining: 0,
            dropout_gain: 1.0,
            dj: [Biquad::new(); 2],
            dj_amount: 0.5,
            wow: Phasor::new(0.5, sample_rate),
            flutter: Phasor::new(6.0, sample_rate),
            crackle: 0.0,
            darken: [OnePole::new(); 2],
        }
    }

    /// Process one stereo frame. Called every sample, whatever the type, so
    /// the decimate grid stays aligned to the sample clock.
    #[inline]
    pub fn process(
        &mut self,
        frame: (f32, f32),
        kind: CorruptType,
        amount: f32,
        rng: &mut Random,
    ) -> (f32, f32) {
        let clock = self.clock;
        self.clock = self.clock.wrapping_add(1);
        self.wow.advance();
        self.flutter.advance();

        if amount <= 0.0 {
            return frame;
        }
        let amount = amount.min(1.0);
        let (l, r) = frame;

        match kind {
            CorruptType::Decimate => {
                let (bits, hold) = decimate_preset(amount);
                if clock % hold == 0 {
                    self.held = [quantize(l, bits), quantize(r, bits)];
                }
                (self.held[0], self.held[1])
            }
            CorruptType::Dropout => {
                let gain = self.dropout(amount, rng);
                (l * gain, r * gain)
            }
            CorruptType::Destroy => (destroy(l, amount), destroy(r, amount)),
            CorruptType::DjFilter => {
                self.update_dj(amount);
                if (amount - 0.5).abs() <= DJ_DEAD_ZONE {
                    (l, r)
                } else {
                    (self.dj[0].process(l), self.dj[1].process(r))
                }
            }
            CorruptType::VinylSim => self.vinyl((l, r), amount, rng),
        }
    }

    fn dropout(&mut self, amount: f32, rng: &mut Random) -> f32 {
        if self.dropout_remaining > 0 {
            self.dropout_remaining -= 1;
        } else {
            let chance = 0.0002 + amount * 0.002;
            if rng.chance(chance) {
                // 200ms at the lowest amount down to 5ms at the top
                let seconds = 0.2 * (0.005f32 / 0.2).powf(amount);
                let jitter = rng.range(0.5, 1.5);
                self.dropout_remaining = (seconds * jitter * self.sample_rate) as usize;
            }
        }
        let target = if self.dropout_remaining > 0 { 0.0 } else { 1.0 };
        // ~1ms ramp so the gaps do not click
        self.dropout_gain += (target - self.dropout_gain) * 0.05;
        self.dropout_gain
    }

    fn update_dj(&mut self, amount: f32) {
        if (amount - self.dj_amount).abs() < 1e-4 {
            return;
        }
        self.dj_amount = amount;
        let distance = ((amount - 0.5).abs() * 2.0).clamp(0.0, 1.0);
        let q = 0.707 + distance * 4.0;
        let (kind, cutoff) = if amount < 0.5 {
            (
                FilterType::LowPass,
                20_000.0 * (DJ_LOWPASS_FLOOR / 20_000.0).powf(distance),
            )
        } else {
            (
                FilterType::HighPass,
                20.0 * (DJ_HIGHPASS_CEILING / 20.0).powf(distance),
            )
        };
        for filter in &mut self.dj {
            filter.set(kind, self.sample_rate, cutoff, q);
        }
    }

    fn vinyl(&mut self, frame: (f32, f32), amount: f32, rng: &mut Random) -> (f32, f32) {
        if rng.chance(amount * 0.0005) {
            self.crackle = rng.range(0.3, 1.0) * amount * rng.either(1.0, -1.0);
        }
        let click = self.crackle;
        self.crackle *= 0.9;

        let hiss = rng.bipolar() * amount * 0.02;
        let cutoff = 20_000.0 - amount * 17_500.0;
        let coeff = OnePole::coefficient(self.sample_rate, cutoff);

        let mut out = [frame.0, frame.1];
        for (ch, sample) in out.iter_mut().enumerate() {
            let dark = self.darken[ch].process(*sample, coeff);
            *sample = *sample * (1.0 - amount) + dark * amount + hiss + click;
        }
        (out[0], out[1])
    }

    pub fn reset(&mut self) {
        self.held = [0.0; 2];
        self.dropout_remaining = 0;
        self.dropout_gain = 1.0;
        for filter in &mut self.dj {
            filter.reset();
        }
        for lp in &mut self.darken {
            lp.reset();
        }
        self.crackle = 0.0;
        self.wow.reset();
        self.flutter.reset();
    }
}

#[inline]
fn destroy(x: f32, amount: f32) -> f32 {
    if amount < 0.5 {
        tanh_saturate(x, 1.0 + amount * 18.0).clamp(-1.0, 1.0)
    } else {
        let harsh = (amount - 0.5) * 2.0;
        let clipped = hard_clip(x, 1.0 + harsh * 9.0, 1.0);
        (clipped + harsh * 0.5 * clipped * clipped * clipped) / (1.0 + harsh * 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimate_preset_table() {
        assert_eq!(decimate_preset(0.0), (16, 1));
        assert_eq!(decimate_preset(0.5), (6, 16));
        assert_eq!(decimate_preset(0.99), (2, 128));
        assert_eq!(decimate_preset(1.0), (2, 128));
    }

    #[test]
    fn test_zero_amount_bypasses() {
        let mut corruptor = Corruptor::new(48_000.0);
        let mut rng = Random::from_seed(3);
        for kind in CorruptType::ALL {
            let out = corruptor.process((0.3, -0.2), *kind, 0.0, &mut rng);
            assert_eq!(out, (0.3, -0.2));
        }
    }

    #[test]
    fn test_decimate_holds_on_grid() {
        let mut corruptor = Corruptor::new(48_000.0);
        let mut rng = Random::from_seed(3);
        let mut last = (0.0, 0.0);
        for i in 0..1024 {
            let x = (i as f32 * 0.05 + 0.3).sin();
            let out = corruptor.process((x, x), CorruptType::Decimate, 1.0, &mut rng);
            if i % 128 != 0 {
                assert_eq!(out, last);
            }
            assert!([-0.75, -0.25, 0.25, 0.75].contains(&out.0));
            last = out;
        }
    }

    #[test]
    fn test_decimate_holds_silence_at_zero() {
        let mut corruptor = Corruptor::new(48_000.0);
        let mut rng = Random::from_seed(3);
        for amount in [0.1, 0.5, 1.0] {
            for _ in 0..512 {
                let out = corruptor.process((0.0, 0.0), CorruptType::Decimate, amount, &mut rng);
                assert_eq!(out, (0.0, 0.0), "amount {}", amount);
            }
        }
    }

    #[test]
    fn test_destroy_bounded() {
        for amount in [0.1, 0.49, 0.5, 0.75, 1.0] {
            for i in -20..=20 {
                let y = destroy(i as f32 / 10.0, amount);
                assert!(y.abs() <= 1.0 + 1e-5, "amount {} gave {}", amount, y);
            }
        }
    }

    #[test]
    fn test_dj_filter_center_is_flat() {
        let mut corruptor = Corruptor::new(48_000.0);
        let mut rng = Random::from_seed(3);
        let out = corruptor.process((0.4, 0.4), CorruptType::DjFilter, 0.5, &mut rng);
        assert_eq!(out, (0.4, 0.4));
    }

    #[test]
    fn test_dropout_eventually_silences() {
        let mut corruptor = Corruptor::new(48_000.0);
        let mut rng = Random::from_seed(11);
        let mut quietest = 1.0f32;
        for _ in 0..48_000 {
            let (l, _) = corruptor.process((1.0, 1.0), CorruptType::Dropout, 1.0, &mut rng);
            quietest = quietest.min(l);
        }
        assert!(quietest < 0.01);
    }
}
