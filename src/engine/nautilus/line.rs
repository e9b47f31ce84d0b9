//! A single delay line with smoothed tap changes.

/*
Delay Line
==========

A ring written once per sample and read `delay` samples behind the write
head. What happens when the delay time changes depends on the mode:

  fade       a jump of more than 100 samples crossfades from the old tap
             to the new one over 50 ms with cos/sin gains. Smaller moves
             snap. A change arriving mid-fade waits for the fade to end.

  doppler    the read delay itself glides toward the target, so the pitch
             bends while it moves.

  shimmer    the tap snaps; pitch is handled on the feedback path.

              write head
                  ▼
    ring  ········●········
             ▲         ▲
          new tap    old tap      fade: both read, gains cross over
*/

use crate::{
    dsp::{buffer::wrap, window::equal_power, CircularBuffer},
    error::EngineError,
};

pub const MIN_DELAY: f64 = 128.0;
/// Moves larger than this crossfade in fade mode.
const FADE_THRESHOLD: f64 = 100.0;
const FADE_SECONDS: f32 = 0.05;
const DOPPLER_RATE: f64 = 0.0001;

/// How a line reacts to a new delay time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Fade,
    Glide,
    Snap,
}

#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: CircularBuffer,
    write_pos: usize,
    delay: f64,
    target: f64,
    /// Tap being faded out, with samples elapsed.
    fading: Option<(f64, usize)>,
    fade_len: usize,
}

impl DelayLine {
    pub fn try_new(capacity: usize, sample_rate: f32) -> Result<Self, EngineError> {
        let buffer = CircularBuffer::try_new(capacity, "nautilus delay line")?;
        Ok(Self {
            buffer,
            write_pos: 0,
            delay: MIN_DELAY,
            target: MIN_DELAY,
            fading: None,
            fade_len: ((FADE_SECONDS * sample_rate) as usize).max(1),
        })
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Clamp a delay time to what the ring can hold.
    pub fn clamp_delay(&self, delay: f64) -> f64 {
        let longest = (self.capacity() - 1) as f64;
        delay.clamp(MIN_DELAY.min(longest), longest)
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_fading(&self) -> bool {
        self.fading.is_some()
    }

    pub fn set_target(&mut self, delay: f64, transition: Transition) {
        self.target = self.clamp_delay(delay);
        match transition {
            Transition::Fade => self.begin_fade(),
            Transition::Glide => {}
            Transition::Snap => self.delay = self.target,
        }
    }

    fn begin_fade(&mut self) {
        if self.fading.is_some() || self.target == self.delay {
            return;
        }
        if (self.target - self.delay).abs() > FADE_THRESHOLD {
            self.fading = Some((self.delay, 0));
        }
        self.delay = self.target;
    }

    /// Finish any transition immediately.
    pub fn settle(&mut self) {
        self.delay = self.target;
        self.fading = None;
    }

    #[inline]
    fn tap(&self, delay: f64) -> f32 {
        let capacity = self.capacity();
        let position = wrap(self.write_pos as f64 - delay, capacity as f64);
        self.buffer.read_interpolated(position, capacity)
    }

    /// Read the delayed sample for this frame.
    #[inline]
    pub fn read(&mut self, transition: Transition) -> f32 {
        if transition == Transition::Glide {
            self.delay += (self.target - self.delay) * DOPPLER_RATE;
        }

        match self.fading {
            Some((from, elapsed)) => {
                let (out_gain, in_gain) = equal_power(elapsed as f32 / self.fade_len as f32);
                let sample = self.tap(from) * out_gain + self.tap(self.delay) * in_gain;
                if elapsed + 1 >= self.fade_len {
                    self.fading = None;
                    if transition == Transition::Fade {
                        self.begin_fade();
                    }
                } else {
                    self.fading = Some((from, elapsed + 1));
                }
                sample
            }
            None => self.tap(self.delay),
        }
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer.write(self.write_pos, sample);
        self.write_pos = (self.write_pos + 1) % self.capacity();
    }

    /// Copy the most recent `len` samples into `dest`.
    pub fn snapshot(&self, len: usize, dest: &mut [f32]) {
        self.buffer.copy_recent(self.write_pos, len, dest);
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.settle();
    }
}
