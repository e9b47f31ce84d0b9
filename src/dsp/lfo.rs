//! Low Frequency Oscillators for tape wobble.

/*
Low Frequency Oscillators
=========================

An LFO is simply an oscillator running at sub-audio frequencies. Here they
never make sound themselves; they nudge a playback rate up and down the way
an imperfect capstan and a warped reel do.

Vocabulary
----------

  phase       Position within one cycle, kept in [0, 1).

  increment   How far the phase moves per sample: frequency / sample_rate.

  wow         Slow pitch drift, well under 1 Hz. A warped or off-centre reel.

  flutter     Faster wobble, several Hz. Capstan and pinch-roller jitter.

  bipolar     Output swings positive AND negative: -1.0 to +1.0. Rate
              modulation is applied as `rate × (1 + depth × lfo)`, so a
              bipolar shape goes sharp and flat by the same amount.


Typical Tape Frequencies
------------------------

    0.1 - 0.5 Hz    Wow
    4 - 8 Hz        Flutter
    > 15 Hz         Approaching audio rate (FM territory), avoided here


Phase Accumulation
------------------

    phase += increment
    if phase ≥ 1: phase −= 1

    sine output = sin(2π · phase)

The phase is an f32 in [0, 1) rather than radians, so it never grows
unbounded and loses precision after hours of running.
*/

use std::f32::consts::TAU;

/// Phase accumulator in `[0, 1)`.
#[derive(Debug, Clone, Copy)]
pub struct Phasor {
    phase: f32,
    increment: f32,
}

impl Phasor {
    pub fn new(frequency_hz: f32, sample_rate: f32) -> Self {
        let mut phasor = Self {
            phase: 0.0,
            increment: 0.0,
        };
        phasor.set_frequency(frequency_hz, sample_rate);
        phasor
    }

    pub fn set_frequency(&mut self, frequency_hz: f32, sample_rate: f32) {
        self.increment = if sample_rate > 0.0 {
            (frequency_hz / sample_rate).clamp(0.0, 0.5)
        } else {
            0.0
        };
    }

    /// Advance one sample and return the new phase.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.phase
    }

    /// Advance one sample and return a bipolar sine.
    #[inline]
    pub fn sine(&mut self) -> f32 {
        (TAU * self.advance()).sin()
    }

    #[inline]
    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}
