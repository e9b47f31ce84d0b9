//! Per-sample parameter smoothing.

/*
Smoothed Parameters
===================

A physical knob cannot jump; a number in memory can. Feeding raw control
values into a gain or a delay time produces zipper noise and clicks. Every
continuous control in this crate therefore keeps two numbers:

  target    Where the user put the knob.
  current   What the DSP actually uses this sample.

and closes the gap by a fixed fraction each sample:

    current += (target − current) × rate

This is a one-pole lowpass on the control signal. With rate = 0.001 the
value covers 63% of a step in 1000 samples (~21ms at 48kHz).

    value
     target ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─
                       ____,,,---'''
               __,--''
          _,-'
      _,-'
     ┘
     current ──────────────────────→ samples

Rates used in this crate sit between 0.0001 (tape-like glides such as a
buffer length or a Doppler delay time) and 0.001 (mix/feedback style
controls). A few controls want no glide at all; they call `set_immediate`.
*/

#[derive(Debug, Clone, Copy)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    rate: f32,
}

impl SmoothedParam {
    pub fn new(value: f32, rate: f32) -> Self {
        Self {
            current: value,
            target: value,
            rate: rate.clamp(0.0, 1.0),
        }
    }

    /// Move the knob. The DSP value glides there over the next samples.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        if target.is_finite() {
            self.target = target;
        }
    }

    /// Jump both target and current.
    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        if value.is_finite() {
            self.target = value;
            self.current = value;
        }
    }

    /// Finish any glide in progress.
    #[inline]
    pub fn snap(&mut self) {
        self.current = self.target;
    }

    /// Advance one sample and return the new current value.
    #[inline]
    pub fn next(&mut self) -> f32 {
        self.current += (self.target - self.current) * self.rate;
        self.current
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }
}
