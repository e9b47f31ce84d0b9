//! Reverb - Room Simulation via Delay Networks
//!
//! Classic Schroeder topology: a bank of parallel feedback combs builds the
//! dense tail, a chain of allpasses smears it into a diffuse wash.
//!
//! # Architecture
//!
//! ```text
//!         ┌──→ [Comb 1] ──┐
//!         ├──→ [Comb 2] ──┤
//! Input ──┼──→   ...    ──┼──→ (+) ──→ [AP 1] ──→ [AP 2] ──→ [AP 3] ──→ [AP 4] ──→ Output
//!         └──→ [Comb 8] ──┘
//! ```
//!
//! ## Comb Filters
//!
//! ```text
//! y[n] = x[n − d] + feedback · lowpass(y[n − d])
//! ```
//!
//! The one-pole lowpass in the loop is the damping: high frequencies die
//! faster than lows, like absorption on soft walls. All eight combs share one
//! damping amount but each keeps its own feedback.
//!
//! ## Allpass Filters
//!
//! ```text
//! y[n] = −g · x[n] + x[n − d] + g · y[n − d]
//! ```
//!
//! ## Delay Table
//!
//! Delays come from a fixed table of mutually-unrelated millisecond values
//! and are scaled by the sample rate at construction, so the room sounds the
//! same at 44.1kHz and 96kHz. The right channel adds a small spread so the
//! two tails decorrelate.

use crate::control::params::mode_enum;

/// Comb delays in ms.
const COMB_DELAYS_MS: [f32; 8] = [25.31, 26.94, 28.96, 30.75, 32.24, 33.81, 35.31, 36.67];
/// Allpass delays in ms.
const ALLPASS_DELAYS_MS: [f32; 4] = [12.61, 10.0, 7.73, 5.10];
/// Right channel offset in ms.
const STEREO_SPREAD_MS: f32 = 0.52;
const ALLPASS_GAIN: f32 = 0.5;

mode_enum! {
    /// Tone presets. Each sets damping and comb feedback together.
    pub enum ReverbPreset ("reverb_preset") {
        Bright => "bright",
        Normal => "normal",
        Dark => "dark",
    }
    default Normal
}

impl ReverbPreset {
    /// `(damping, comb feedback)`
    pub fn settings(self) -> (f32, f32) {
        match self {
            ReverbPreset::Bright => (0.15, 0.86),
            ReverbPreset::Normal => (0.35, 0.84),
            ReverbPreset::Dark => (0.65, 0.8),
        }
    }
}

/// Feedback comb with damping in the loop (pre-allocated, RT-safe)
#[derive(Debug, Clone)]
pub struct CombFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    feedback: f32,
    damp: f32,
    filter_state: f32,
}

impl CombFilter {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)],
            write_pos: 0,
            feedback: 0.84,
            damp: 0.35,
            filter_state: 0.0,
        }
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.99);
    }

    pub fn set_damp(&mut self, damp: f32) {
        self.damp = damp.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.write_pos];

        self.filter_state = output * (1.0 - self.damp) + self.filter_state * self.damp;
        self.buffer[self.write_pos] = input + self.filter_state * self.feedback;

        self.write_pos += 1;
        if self.write_pos >= self.buffer.len() {
            self.write_pos = 0;
        }

        output
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.write_pos = 0;
    }
}

/// Schroeder allpass for diffusion (pre-allocated, RT-safe)
#[derive(Debug, Clone)]
pub struct AllpassFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    gain: f32,
}

impl AllpassFilter {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)],
            write_pos: 0,
            gain: ALLPASS_GAIN,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.write_pos];
        let output = -self.gain * input + delayed;
        self.buffer[self.write_pos] = input + self.gain * output;

        self.write_pos += 1;
        if self.write_pos >= self.buffer.len() {
            self.write_pos = 0;
        }

        output
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// One channel of the reverb: 8 combs into 4 allpasses.
#[derive(Debug, Clone)]
pub struct SchroederReverb {
    combs: [CombFilter; 8],
    allpasses: [AllpassFilter; 4],
}

impl SchroederReverb {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_spread(sample_rate, 0.0)
    }

    /// Build with every delay lengthened by `spread_ms`.
    pub fn with_spread(sample_rate: f32, spread_ms: f32) -> Self {
        let samples = |ms: f32| ((ms + spread_ms) * sample_rate / 1000.0) as usize;
        let mut reverb = Self {
            combs: COMB_DELAYS_MS.map(|ms| CombFilter::new(samples(ms))),
            allpasses: ALLPASS_DELAYS_MS.map(|ms| AllpassFilter::new(samples(ms))),
        };
        reverb.set_preset(ReverbPreset::Normal);
        reverb
    }

    pub fn set_preset(&mut self, preset: ReverbPreset) {
        let (damping, feedback) = preset.settings();
        for comb in &mut self.combs {
            comb.set_damp(damping);
            comb.set_feedback(feedback);
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let mut output = 0.0;
        for comb in &mut self.combs {
            output += comb.process(input);
        }
        output *= 0.125;

        for allpass in &mut self.allpasses {
            output = allpass.process(output);
        }

        output
    }

    pub fn reset(&mut self) {
        for comb in &mut self.combs {
            comb.reset();
        }
        for allpass in &mut self.allpasses {
            allpass.reset();
        }
    }
}

/// Left/right pair sharing one preset.
#[derive(Debug, Clone)]
pub struct StereoReverb {
    left: SchroederReverb,
    right: SchroederReverb,
    preset: ReverbPreset,
}

impl StereoReverb {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            left: SchroederReverb::new(sample_rate),
            right: SchroederReverb::with_spread(sample_rate, STEREO_SPREAD_MS),
            preset: ReverbPreset::Normal,
        }
    }

    pub fn set_preset(&mut self, preset: ReverbPreset) {
        self.preset = preset;
        self.left.set_preset(preset);
        self.right.set_preset(preset);
    }

    pub fn preset(&self) -> ReverbPreset {
        self.preset
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        (self.left.process(left), self.right.process(right))
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comb_filter_creates_echo() {
        let mut comb = CombFilter::new(10);
        comb.set_feedback(0.5);
        comb.set_damp(0.0);

        let out1 = comb.process(1.0);
        assert!(out1.abs() < 0.01);

        for _ in 0..9 {
            comb.process(0.0);
        }

        let echo = comb.process(0.0);
        assert!((echo - 1.0).abs() < 1e-6);

        for _ in 0..9 {
            comb.process(0.0);
        }
        let second = comb.process(0.0);
        assert!((second - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_allpass_preserves_energy() {
        let mut allpass = AllpassFilter::new(5);

        let mut energy_in = 0.0;
        let mut energy_out = 0.0;
        for i in 0..200 {
            let input = if i < 10 { 1.0 } else { 0.0 };
            let output = allpass.process(input);
            energy_in += input * input;
            energy_out += output * output;
        }

        assert!((energy_out - energy_in).abs() < energy_in * 0.05);
    }

    #[test]
    fn test_reverb_produces_tail() {
        let mut reverb = SchroederReverb::new(48_000.0);
        let _ = reverb.process(1.0);

        let mut has_tail = false;
        for _ in 0..5000 {
            if reverb.process(0.0).abs() > 0.001 {
                has_tail = true;
                break;
            }
        }
        assert!(has_tail, "Reverb should produce a tail after impulse");
    }

    #[test]
    fn test_presets_are_stable() {
        for preset in [ReverbPreset::Bright, ReverbPreset::Normal, ReverbPreset::Dark] {
            let mut reverb = StereoReverb::new(48_000.0);
            reverb.set_preset(preset);
            for _ in 0..20_000 {
                let (l, r) = reverb.process(0.1, -0.1);
                assert!(l.is_finite() && r.is_finite());
                assert!(l.abs() < 10.0 && r.abs() < 10.0, "unstable: {} {}", l, r);
            }
        }
    }

    #[test]
    fn test_dark_decays_highs_faster() {
        let (bright_damp, bright_fb) = ReverbPreset::Bright.settings();
        let (dark_damp, dark_fb) = ReverbPreset::Dark.settings();
        assert!(dark_damp > bright_damp);
        assert!(dark_fb < bright_fb);
    }
}
