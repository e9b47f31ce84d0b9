use std::f32::consts::{PI, TAU};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
| type      | built from                 | passes       | rejects      |
| --------- | -------------------------- | ------------ | ------------ |
| low-pass  | RBJ biquad                 | below cutoff | above cutoff |
| high-pass | RBJ biquad                 | above cutoff | below cutoff |
| 4-pole    | two biquads in series      | same, 24dB/o | same         |
| one-pole  | leaky integrator           | below cutoff | gently above |

Biquad difference equation (direct form I):

    y[n] = b0·x[n] + b1·x[n−1] + b2·x[n−2] − a1·y[n−1] − a2·y[n−2]

Coefficients follow the Audio EQ Cookbook, normalised by a0.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
}

/// Second-order IIR section with its own history taps.
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

impl Biquad {
    /// A pass-through section.
    pub fn new() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn lowpass(sample_rate: f32, cutoff_hz: f32, q: f32) -> Self {
        let mut filter = Self::new();
        filter.set(FilterType::LowPass, sample_rate, cutoff_hz, q);
        filter
    }

    pub fn highpass(sample_rate: f32, cutoff_hz: f32, q: f32) -> Self {
        let mut filter = Self::new();
        filter.set(FilterType::HighPass, sample_rate, cutoff_hz, q);
        filter
    }

    /// Recompute coefficients. History is kept so sweeps stay continuous.
    pub fn set(&mut self, filter_type: FilterType, sample_rate: f32, cutoff_hz: f32, q: f32) {
        let nyquist_guard = 0.49 * sample_rate;
        let cutoff = cutoff_hz.clamp(10.0, nyquist_guard.max(10.0));
        let q = q.clamp(0.1, 20.0);

        let w0 = TAU * cutoff / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;

        let (b0, b1, b2) = match filter_type {
            FilterType::LowPass => {
                let b1 = 1.0 - cos_w0;
                (b1 * 0.5, b1, b1 * 0.5)
            }
            FilterType::HighPass => {
                let b1 = -(1.0 + cos_w0);
                (-b1 * 0.5, b1, -b1 * 0.5)
            }
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = (-2.0 * cos_w0) / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        // keep denormals out of the feedback taps
        self.y1 = if y.abs() < 1e-20 { 0.0 } else { y };

        self.y1
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// Single-pole lowpass accumulator: `z += coeff · (x − z)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnePole {
    z: f32,
}

impl OnePole {
    pub fn new() -> Self {
        Self { z: 0.0 }
    }

    /// Coefficient for a given cutoff: `1 − e^(−2π·fc/sr)`.
    #[inline]
    pub fn coefficient(sample_rate: f32, cutoff_hz: f32) -> f32 {
        let cutoff = cutoff_hz.clamp(1.0, 0.49 * sample_rate);
        1.0 - (-2.0 * PI * cutoff / sample_rate).exp()
    }

    #[inline]
    pub fn process(&mut self, x: f32, coeff: f32) -> f32 {
        self.z += coeff * (x - self.z);
        self.z
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.z
    }

    pub fn reset(&mut self) {
        self.z = 0.0;
    }
}
