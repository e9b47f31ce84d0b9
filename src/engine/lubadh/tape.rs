//! Tape coloration shared by both decks.

/*
Tape
====

One `tape` amount drives everything. At 0 the stage is a bypass and the
playback rate is untouched.

  saturation   asymmetric tanh plus a small second harmonic, drive 1 → 3
  lowpass      one pole, cutoff 18 kHz / (1 + 4 × tape)
  wow          0.3 Hz sine on the playback rate
  flutter      5.5 Hz sine on the playback rate
  noise        a little random jitter on the playback rate

Each deck owns its own `Tape` so the decks drift independently.
*/

use crate::dsp::{distortion::asymmetric_saturate, filter::OnePole, lfo::Phasor, Random};

const WOW_HZ: f32 = 0.3;
const FLUTTER_HZ: f32 = 5.5;
const WOW_DEPTH: f32 = 0.004;
const FLUTTER_DEPTH: f32 = 0.0015;
const NOISE_DEPTH: f32 = 0.0005;
const LOWPASS_BASE_HZ: f32 = 18_000.0;

#[derive(Debug, Clone, Copy)]
pub struct Tape {
    amount: f32,
    wow: Phasor,
    flutter: Phasor,
    lowpass: OnePole,
    coeff: f32,
}

impl Tape {
    pub fn new(sample_rate: f32) -> Self {
        let mut tape = Self {
            amount: 0.0,
            wow: Phasor::new(WOW_HZ, sample_rate),
            flutter: Phasor::new(FLUTTER_HZ, sample_rate),
            lowpass: OnePole::new(),
            coeff: 1.0,
        };
        tape.set_amount(0.0, sample_rate);
        tape
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn set_amount(&mut self, amount: f32, sample_rate: f32) {
        self.amount = amount.clamp(0.0, 1.0);
        let cutoff = LOWPASS_BASE_HZ / (1.0 + 4.0 * self.amount);
        self.coeff = OnePole::coefficient(sample_rate, cutoff);
    }

    /// Multiplier for this sample's playback rate.
    #[inline]
    pub fn rate_factor(&mut self, rng: &mut Random) -> f32 {
        if self.amount <= 0.0 {
            return 1.0;
        }
        let wow = self.wow.sine() * WOW_DEPTH;
        let flutter = self.flutter.sine() * FLUTTER_DEPTH;
        let noise = rng.bipolar() * NOISE_DEPTH;
        1.0 + self.amount * (wow + flutter + noise)
    }

    #[inline]
    pub fn color(&mut self, x: f32) -> f32 {
        if self.amount <= 0.0 {
            return x;
        }
        let a = self.amount;
        let saturated = asymmetric_saturate(x, 1.0 + 2.0 * a, 0.2 * a);
        let shaped = saturated + 0.05 * a * saturated * saturated;
        self.lowpass.process(shaped, self.coeff)
    }

    pub fn reset(&mut self) {
        self.wow.reset();
        self.flutter.reset();
        self.lowpass.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_amount_is_transparent() {
        let mut tape = Tape::new(48_000.0);
        let mut rng = Random::from_seed(1);
        assert_eq!(tape.rate_factor(&mut rng), 1.0);
        assert_eq!(tape.color(0.42), 0.42);
    }

    #[test]
    fn test_rate_wobble_is_small() {
        let mut tape = Tape::new(48_000.0);
        tape.set_amount(1.0, 48_000.0);
        let mut rng = Random::from_seed(1);
        let mut moved = false;
        for _ in 0..48_000 {
            let f = tape.rate_factor(&mut rng);
            assert!((f - 1.0).abs() < 0.01);
            moved |= f != 1.0;
        }
        assert!(moved);
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut tape = Tape::new(48_000.0);
        tape.set_amount(0.8, 48_000.0);
        for _ in 0..100 {
            assert_eq!(tape.color(0.0), 0.0);
        }
    }
}
