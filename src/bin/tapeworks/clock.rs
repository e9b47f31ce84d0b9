//! Clock - sample-accurate metronome pulses
//!
//! Runs in the audio thread and tells the callback how many frames it may
//! render before the next pulse is due.

/// Pulses per beat sent to the engine.
const PULSES_PER_BEAT: f64 = 1.0;

pub struct Clock {
    sample_rate: f64,
    /// Samples between pulses (fractional, so long runs do not drift)
    samples_per_pulse: f64,
    /// Samples left until the next pulse
    countdown: f64,
    running: bool,
}

impl Clock {
    pub fn new(bpm: f64, sample_rate: f64) -> Self {
        let samples_per_pulse = Self::compute_samples_per_pulse(bpm, sample_rate);
        Self {
            sample_rate,
            samples_per_pulse,
            countdown: 0.0,
            running: false,
        }
    }

    fn compute_samples_per_pulse(bpm: f64, sample_rate: f64) -> f64 {
        // pulses per second = (bpm / 60) * pulses per beat
        let pulses_per_second = (bpm.max(1.0) / 60.0) * PULSES_PER_BEAT;
        (sample_rate / pulses_per_second).max(1.0)
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.samples_per_pulse = Self::compute_samples_per_pulse(bpm, self.sample_rate);
        self.countdown = self.countdown.min(self.samples_per_pulse);
    }

    /// True when a pulse is due at the current frame. Consumes it.
    pub fn take_pulse(&mut self) -> bool {
        if !self.running || self.countdown > 0.0 {
            return false;
        }
        self.countdown += self.samples_per_pulse;
        true
    }

    /// Frames that can be rendered before the next pulse, between 1 and
    /// `max`.
    pub fn frames_until_pulse(&self, max: usize) -> usize {
        if !self.running {
            return max;
        }
        (self.countdown.ceil() as usize).clamp(1, max.max(1))
    }

    pub fn advance(&mut self, frames: usize) {
        if self.running {
            self.countdown -= frames as f64;
        }
    }

    pub fn toggle(&mut self) {
        self.running = !self.running;
        self.countdown = 0.0;
    }
}
