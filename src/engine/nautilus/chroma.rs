//! Colour stage on each delay line's feedback path.

/*
Chroma
======

One type and one depth are shared by all eight lines; every line keeps
its own filter memory. Depth 0 is a bypass for every type.

  type        depth 0 → 1
  ---------   ---------------------------------------------
  low pass    4-pole, cutoff 20 kHz → 200 Hz
  high pass   4-pole, cutoff 20 Hz → 5 kHz
  bitcrush    16 → 2 bits, hold 1 → 16 samples
  saturate    asymmetric tanh, drive 1 → 10
  wavefold    sine folder, drive 1 → 6
  distort     hard clip at full scale, drive 1 → 21
*/

use crate::{
    control::params::mode_enum,
    dsp::{
        distortion::{asymmetric_saturate, hard_clip, quantize, sine_fold},
        filter::{Biquad, FilterType},
    },
};

mode_enum! {
    pub enum ChromaType ("chroma_type") {
        LowPass => "low_pass",
        HighPass => "high_pass",
        Bitcrush => "bitcrush",
        Saturate => "saturate",
        Wavefold => "wavefold",
        Distort => "distort",
    }
    default LowPass
}

const BUTTERWORTH_Q: f32 = 0.707;

#[derive(Debug, Clone, Copy)]
pub struct Chroma {
    kind: ChromaType,
    depth: f32,
    filters: [Biquad; 2],
    bits: u32,
    hold: u32,
    held: f32,
    counter: u32,
}

impl Chroma {
    pub fn new() -> Self {
        Self {
            kind: ChromaType::default(),
            depth: 0.0,
            filters: [Biquad::new(); 2],
            bits: 16,
            hold: 1,
            held: 0.0,
            counter: 0,
        }
    }

    /// Recompute coefficients. Control-rate; filter memory is kept.
    pub fn configure(&mut self, kind: ChromaType, depth: f32, sample_rate: f32) {
        self.kind = kind;
        self.depth = depth.clamp(0.0, 1.0);
        match kind {
            ChromaType::LowPass => {
                let cutoff = 20_000.0 * (200.0f32 / 20_000.0).powf(self.depth);
                self.set_filters(FilterType::LowPass, sample_rate, cutoff);
            }
            ChromaType::HighPass => {
                let cutoff = 20.0 * (5_000.0f32 / 20.0).powf(self.depth);
                self.set_filters(FilterType::HighPass, sample_rate, cutoff);
            }
            ChromaType::Bitcrush => {
                self.bits = 16 - (self.depth * 14.0).round() as u32;
                self.hold = 1 + (self.depth * 15.0).round() as u32;
            }
            _ => {}
        }
    }

    fn set_filters(&mut self, kind: FilterType, sample_rate: f32, cutoff: f32) {
        let cutoff = cutoff.min(sample_rate * 0.45);
        for filter in &mut self.filters {
            filter.set(kind, sample_rate, cutoff, BUTTERWORTH_Q);
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        if self.depth <= 0.0 {
            return x;
        }
        let depth = self.depth;
        match self.kind {
            ChromaType::LowPass | ChromaType::HighPass => {
                let y = self.filters[0].process(x);
                self.filters[1].process(y)
            }
            ChromaType::Bitcrush => {
                if self.counter == 0 {
                    self.held = quantize(x, self.bits);
                }
                self.counter = (self.counter + 1) % self.hold;
                self.held
            }
            ChromaType::Saturate => asymmetric_saturate(x, 1.0 + depth * 9.0, depth * 0.3),
            ChromaType::Wavefold => sine_fold(x, 1.0 + depth * 5.0),
            ChromaType::Distort => {
                let drive = 1.0 + depth * 20.0;
                hard_clip(x, drive, 1.0)
            }
        }
    }

    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
        self.held = 0.0;
        self.counter = 0;
    }
}

impl Default for Chroma {
    fn default() -> Self {
        Self::new()
    }
}
