//! Bipolar vari-speed knob curves.

/*
Vari-Speed
==========

One knob controls both direction and speed. Noon is stopped, clockwise
plays forward, counter-clockwise plays backward:

    rate
     +max ┤                              ╭
          │                           ╭──╯   exponential, 1× → +max
       +1 ┤                      ╭────╯
          │                 ╭────╯           linear, 0 → 1×
        0 ┤━━━━━━━━━━━━━━━━━┿━━━━━           dead zone ±0.02
          │       ╭────╯
       -1 ┤  ╭────╯
          │╭─╯
     -max ┤
          └────────────────────────────────→ knob
          0               0.5              1

Within each direction the travel `t ∈ (0, 1]` is measured from the edge of
the dead zone to the end stop:

    t ≤ 0.5    rate = t / 0.5                       (linear up to 1×)
    t > 0.5    rate = 2^(semitones · (t − 0.5)/0.5 / 12)

so the first half of the travel is fine control around normal speed and the
second half sweeps the musical range. The two directions may have different
ranges: the granular looper tops out an octave up forward but 26 semitones
down in reverse (about 0.22×), while the tape looper reaches 4× both ways.
*/

/// Stopped zone either side of noon.
pub const DEAD_ZONE: f32 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarispeedCurve {
    pub dead_zone: f32,
    /// Semitone offset at the clockwise stop.
    pub forward_semitones: f32,
    /// Semitone offset at the counter-clockwise stop.
    pub reverse_semitones: f32,
}

impl VarispeedCurve {
    /// +12 forward, −26 reverse.
    pub const GRANULAR: Self = Self {
        dead_zone: DEAD_ZONE,
        forward_semitones: 12.0,
        reverse_semitones: -26.0,
    };

    /// ±4× both ways.
    pub const TAPE: Self = Self {
        dead_zone: DEAD_ZONE,
        forward_semitones: 24.0,
        reverse_semitones: 24.0,
    };

    /// Signed playback rate for a knob position in `[0, 1]`.
    pub fn rate(&self, knob: f32) -> f32 {
        if !knob.is_finite() {
            return 0.0;
        }
        let knob = knob.clamp(0.0, 1.0);
        let offset = knob - 0.5;
        if offset.abs() <= self.dead_zone {
            return 0.0;
        }

        let span = (0.5 - self.dead_zone).max(f32::EPSILON);
        let t = ((offset.abs() - self.dead_zone) / span).min(1.0);
        let (sign, semitones) = if offset > 0.0 {
            (1.0, self.forward_semitones)
        } else {
            (-1.0, self.reverse_semitones)
        };

        let magnitude = if t <= 0.5 {
            t / 0.5
        } else {
            (semitones * (t - 0.5) / 0.5 / 12.0).exp2()
        };
        sign * magnitude
    }
}
