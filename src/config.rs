//! Construction-time configuration shared by every engine.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{error::EngineError, MAX_BLOCK_SIZE};

/// Sample rate, random seed and buffer capacities.
///
/// The defaults reproduce the hardware units: 65 s for the tape glitcher,
/// 174 s of reel for the granular looper, 10 s per delay line and ten minutes
/// per looper deck. Tests and benches shrink these to keep memory small.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: f32,
    /// Seed for the engine's single random source.
    pub seed: u64,
    /// Largest block the host hands to `process` in one call.
    pub max_block_size: usize,
    pub databender_seconds: f32,
    pub morphagene_seconds: f32,
    pub nautilus_seconds: f32,
    pub lubadh_seconds: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            seed: 0x5EED,
            max_block_size: MAX_BLOCK_SIZE,
            databender_seconds: 65.0,
            morphagene_seconds: 174.0,
            nautilus_seconds: 10.0,
            lubadh_seconds: 600.0,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Scale every buffer capacity to `seconds`. Handy for tests.
    pub fn with_buffer_seconds(mut self, seconds: f32) -> Self {
        self.databender_seconds = seconds;
        self.morphagene_seconds = seconds;
        self.nautilus_seconds = seconds;
        self.lubadh_seconds = seconds;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(EngineError::InvalidSampleRate(self.sample_rate));
        }
        let durations = [
            ("databender_seconds", self.databender_seconds),
            ("morphagene_seconds", self.morphagene_seconds),
            ("nautilus_seconds", self.nautilus_seconds),
            ("lubadh_seconds", self.lubadh_seconds),
        ];
        for (what, value) in durations {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::InvalidDuration { what, value });
            }
        }
        if self.max_block_size == 0 {
            return Err(EngineError::InvalidDuration {
                what: "max_block_size",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// Number of samples needed to hold `seconds` of audio.
    pub fn samples_for(&self, seconds: f32) -> usize {
        (seconds as f64 * self.sample_rate as f64).ceil().max(1.0) as usize
    }
}
