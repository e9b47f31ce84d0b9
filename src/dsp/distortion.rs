//! Distortion / Waveshaping
//!
//! Distortion adds harmonics by reshaping the waveform. The "drive" parameter
//! controls how aggressively the signal is pushed into the nonlinear region.
//!
//! # How Waveshaping Works
//!
//! A waveshaper applies a transfer function to each sample:
//!   output = f(input * drive)
//!
//! When drive is low (1.0), the signal stays in the linear region of f()
//! and passes through mostly unchanged. As drive increases, the signal hits
//! the nonlinear parts of f(), creating harmonic distortion.
//!
//! # Shapes used by the effect units
//!
//! Tanh saturation:
//!   f(x) = tanh(x · drive)
//!   - Smooth, symmetric; only odd harmonics
//!   - Tape-glitch "destroy" at low amounts
//!
//! Asymmetric saturation:
//!   positive half driven harder than negative half
//!   - Adds even harmonics, sounds like a biased tube or tape head
//!   - Delay chroma "saturate", looper tape coloration
//!
//! Hard Clip:
//!   f(x) = clamp(x, -threshold, threshold)
//!   - Harsh, buzzy distortion, creates odd harmonics (like square wave)
//!
//! Sine fold:
//!   f(x) = sin(x · drive · π/2)
//!   - Instead of flattening, peaks wrap back down
//!   - Metallic, synthy; the delay chroma "wavefold"
//!
//! Quantize:
//!   f(x) = (⌊x · L/2⌋ + 0.5) / (L/2),   L = 2^bits
//!   - Mid-rise quantizer: exactly L output levels in [-1, 1]
//!   - At 2 bits: ±0.25, ±0.75
//!   - Digital silence stays silent: f(0) = 0
//!
//! # Drive Values
//!
//!   1.0  = Clean-ish
//!   2-4  = Warm saturation
//!   5-10 = Obvious distortion
//!   10+  = Heavy, aggressive

use std::f32::consts::FRAC_PI_2;

/// Symmetric saturation, normalised so full-scale input stays near full-scale.
#[inline]
pub fn tanh_saturate(sample: f32, drive: f32) -> f32 {
    let drive = drive.max(1e-3);
    (sample * drive).tanh() / drive.tanh().max(1e-3)
}

/// Tanh with a harder positive half. `asymmetry` in `[0, 1]`.
#[inline]
pub fn asymmetric_saturate(sample: f32, drive: f32, asymmetry: f32) -> f32 {
    let x = sample * drive;
    if x >= 0.0 {
        (x * (1.0 + asymmetry)).tanh()
    } else {
        x.tanh()
    }
}

/// Hard clipping - simply clamps the signal at a threshold.
#[inline]
pub fn hard_clip(sample: f32, drive: f32, threshold: f32) -> f32 {
    let x = sample * drive;
    x.clamp(-threshold, threshold)
}

/// Sine wavefolder.
#[inline]
pub fn sine_fold(sample: f32, drive: f32) -> f32 {
    (sample * drive * FRAC_PI_2).sin()
}

/// Mid-rise quantizer with exactly `2^bits` levels over `[-1, 1]`.
///
/// Input is clamped first so a hot signal cannot create extra levels. An
/// exact zero passes through, otherwise silence would come out as a DC
/// offset of half a step.
#[inline]
pub fn quantize(sample: f32, bits: u32) -> f32 {
    if sample == 0.0 {
        return 0.0;
    }
    let bits = bits.clamp(1, 24);
    let half = (1u32 << (bits - 1)) as f32;
    let x = sample.clamp(-1.0, 1.0);
    let step = (x * half).floor().clamp(-half, half - 1.0);
    (step + 0.5) / half
}
