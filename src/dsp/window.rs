//! Window shapes and crossfade curves.

/*
Windows and Crossfades
======================

Any time audio is cut (a repeat boundary, a grain edge, a loop wrap) the
waveform jumps and the ear hears a click. The fix is always the same: fade
the edge.

Vocabulary
----------

  x           Normalised position in a fade, 0 at the start, 1 at the end.

  window      A gain curve applied to a whole segment: rises from 0, holds,
              falls back to 0.

  crossfade   Two gains applied at once, one falling and one rising, so one
              signal hands over to another.


Shapes
------

  raised cosine   0.5 − 0.5·cos(π·x)      smooth S from 0 to 1
  hann            0.5 − 0.5·cos(2π·x)     full bell over a grain, 0 at both ends
  equal power     (cos(x·π/2), sin(x·π/2))
  sqrt            (√(1 − x), √x)

Linear crossfades dip about 3dB in the middle because two half-amplitude
uncorrelated signals sum to less than one full one. The last two pairs keep
out² + in² = 1 so perceived loudness stays put.

    gain
     1 ┤╲_              _╱       equal power
       │   ╲__      __╱
       │      ╲╳╳╳╱           (both ≈ 0.707 at x = 0.5)
       │   __╱    ╲__
     0 ┤╱‾             ‾╲
       └──────────────────→ x
*/

use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Smooth rise from 0 at `x = 0` to 1 at `x = 1`.
#[inline]
pub fn raised_cosine(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    0.5 - 0.5 * (PI * x).cos()
}

/// Hann window over `x ∈ [0, 1]`.
#[inline]
pub fn hann(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    0.5 - 0.5 * (TAU * x).cos()
}

/// `(fade_out, fade_in)` gains with `out² + in² = 1`.
#[inline]
pub fn equal_power(x: f32) -> (f32, f32) {
    let angle = x.clamp(0.0, 1.0) * FRAC_PI_2;
    (angle.cos(), angle.sin())
}

/// `(fade_out, fade_in)` square-root gains.
#[inline]
pub fn sqrt_fade(x: f32) -> (f32, f32) {
    let x = x.clamp(0.0, 1.0);
    ((1.0 - x).sqrt(), x.sqrt())
}

/// Gain for `position` inside a segment of `length` samples with a
/// raised-cosine fade of `width` samples at both ends.
///
/// A zero width means no fade. The fade is capped at half the segment so the
/// two ends never overlap.
#[inline]
pub fn segment_fade(position: f64, length: f64, width: f64) -> f32 {
    if length <= 0.0 {
        return 0.0;
    }
    let width = width.min(length * 0.5);
    if width <= 0.0 {
        return 1.0;
    }
    let position = position.clamp(0.0, length);
    let from_end = length - position;
    if position < width {
        raised_cosine((position / width) as f32)
    } else if from_end < width {
        raised_cosine((from_end / width) as f32)
    } else {
        1.0
    }
}
