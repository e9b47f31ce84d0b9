//! One grain voice: a short enveloped read through a splice.

use crate::dsp::{CircularBuffer, GrainEnvelope};

/// Attack and release of every grain.
pub const GRAIN_RAMP_SECONDS: f32 = 0.002;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GrainFrame {
    pub left: f32,
    pub right: f32,
    /// The grain just reached the end of its gene.
    pub ended: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct GrainVoice {
    envelope: GrainEnvelope,
    splice_start: usize,
    splice_len: usize,
    /// Offset inside the splice.
    position: f64,
    progress: f64,
    gene_len: f64,
    ratio: f64,
    gain: f32,
    pan: f32,
    ended: bool,
}

impl GrainVoice {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            envelope: GrainEnvelope::from_seconds(
                sample_rate,
                GRAIN_RAMP_SECONDS,
                GRAIN_RAMP_SECONDS,
            ),
            splice_start: 0,
            splice_len: 0,
            position: 0.0,
            progress: 0.0,
            gene_len: 1.0,
            ratio: 1.0,
            gain: 1.0,
            pan: 0.0,
            ended: false,
        }
    }

    /// Start a grain of `gene_len` samples at `offset` inside the splice
    /// `[start, start + len)`.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        &mut self,
        start: usize,
        len: usize,
        offset: f64,
        gene_len: f64,
        ratio: f64,
        gain: f32,
        pan: f32,
    ) {
        self.splice_start = start;
        self.splice_len = len;
        self.position = offset;
        self.progress = 0.0;
        self.gene_len = gene_len.max(1.0);
        self.ratio = ratio;
        self.gain = gain;
        self.pan = pan.clamp(-1.0, 1.0);
        self.ended = false;
        self.envelope.trigger();
    }

    pub fn is_active(&self) -> bool {
        self.envelope.is_active()
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Absolute reel position of the read head.
    pub fn reel_position(&self) -> usize {
        if self.splice_len == 0 {
            return self.splice_start;
        }
        let offset = self.position.rem_euclid(self.splice_len as f64) as usize;
        self.splice_start + offset.min(self.splice_len - 1)
    }

    /// Render one frame and advance by `rate` (before the chord ratio).
    #[inline]
    pub fn next(&mut self, reel: &[CircularBuffer; 2], rate: f64) -> GrainFrame {
        if !self.envelope.is_active() {
            return GrainFrame::default();
        }

        let remaining = (1.0 - self.progress) * self.gene_len;
        if remaining <= self.envelope.release_samples() as f64 {
            self.envelope.release();
        }
        let level = self.envelope.next() * self.gain;

        let left = reel[0].read_region(self.splice_start, self.splice_len, self.position);
        let right = reel[1].read_region(self.splice_start, self.splice_len, self.position);
        let (gl, gr) = balance(self.pan);

        self.position += rate * self.ratio;
        if self.splice_len > 0 {
            self.position = self.position.rem_euclid(self.splice_len as f64);
        }
        self.progress += 1.0 / self.gene_len;

        let finished = self.progress >= 1.0 || !self.envelope.is_active();
        let ended = !self.ended && finished;
        if ended {
            self.ended = true;
            self.envelope.release();
        }

        GrainFrame {
            left: left * level * gl,
            right: right * level * gr,
            ended,
        }
    }

    pub fn reset(&mut self) {
        self.envelope.reset();
        self.progress = 0.0;
        self.ended = false;
    }
}

/// Balance law with unity gain in the centre.
#[inline]
fn balance(pan: f32) -> (f32, f32) {
    (1.0 - pan.max(0.0), 1.0 + pan.min(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_reel(len: usize) -> [CircularBuffer; 2] {
        let mut l = CircularBuffer::new(len);
        let mut r = CircularBuffer::new(len);
        let data: Vec<f32> = (0..len).map(|i| i as f32 / len as f32).collect();
        l.load(&data).unwrap();
        r.load(&data).unwrap();
        [l, r]
    }

    #[test]
    fn test_grain_lifecycle() {
        let reel = ramp_reel(1000);
        let mut voice = GrainVoice::new(8_000.0);
        voice.spawn(0, 1000, 0.0, 200.0, 1.0, 1.0, 0.0);

        let mut ends = 0;
        let mut samples = 0;
        while voice.is_active() && samples < 1000 {
            if voice.next(&reel, 1.0).ended {
                ends += 1;
            }
            samples += 1;
        }
        assert_eq!(ends, 1);
        assert!(!voice.is_active());
        assert!((200..=202).contains(&samples), "{samples}");
    }

    #[test]
    fn test_envelope_bounds_output() {
        let reel = ramp_reel(1000);
        let mut voice = GrainVoice::new(8_000.0);
        voice.spawn(0, 1000, 500.0, 100.0, 1.0, 1.0, 0.0);
        let first = voice.next(&reel, 1.0);
        assert!(first.left < 0.5 / 16.0 + 1e-6);
    }

    #[test]
    fn test_wraps_inside_splice() {
        let reel = ramp_reel(1000);
        let mut voice = GrainVoice::new(8_000.0);
        voice.spawn(100, 50, 45.0, 400.0, 1.0, 1.0, 0.0);
        for _ in 0..200 {
            voice.next(&reel, 1.0);
            let p = voice.reel_position();
            assert!((100..150).contains(&p));
        }
    }

    #[test]
    fn test_hard_pan() {
        let reel = ramp_reel(100);
        let mut voice = GrainVoice::new(8_000.0);
        voice.spawn(0, 100, 50.0, 80.0, 1.0, 1.0, 1.0);
        for _ in 0..30 {
            let frame = voice.next(&reel, 1.0);
            assert_eq!(frame.left, 0.0);
        }
    }
}
