//! Errors surfaced to the control plane.
//!
//! Nothing on the audio path returns these: knobs clamp, degenerate lengths
//! play silence. Only construction, bulk buffer loading and preset decoding
//! can fail.

use thiserror::Error;

use crate::engine::EngineKind;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f32),

    #[error("{what} must be positive and finite, got {value}")]
    InvalidDuration { what: &'static str, value: f32 },

    #[error("could not allocate {samples} samples for {what}")]
    Allocation { what: &'static str, samples: usize },

    #[error("buffer of {len} samples does not fit capacity {capacity}")]
    BufferTooLong { len: usize, capacity: usize },

    #[error("splice markers must be ascending and inside the recording ({0})")]
    InvalidMarkers(String),

    #[error("preset is for {found:?}, engine is {expected:?}")]
    EngineMismatch { expected: EngineKind, found: EngineKind },

    #[cfg(feature = "serde")]
    #[error("preset could not be decoded: {0}")]
    Preset(#[from] serde_json::Error),
}
