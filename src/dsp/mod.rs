//! Low-level DSP primitives shared by the effect engines.
//!
//! These components are allocation-free after construction and realtime-safe,
//! making them safe to embed directly inside engine structs. They stay focused
//! on the signal-processing math so the engines can layer on state machines
//! and parameter handling.

/// Ring storage with fractional interpolated reads.
pub mod buffer;
/// Waveshapers and the quantizer.
pub mod distortion;
/// Attack/sustain/release envelope for grains.
pub mod envelope;
/// Biquad and one-pole filters.
pub mod filter;
/// Phase accumulators for wow and flutter.
pub mod lfo;
/// Granular pitch shifter.
pub mod pitch_shift;
/// Seedable random source.
pub mod random;
/// Comb/allpass reverb.
pub mod reverb;
/// Per-sample parameter smoothing.
pub mod smooth;
/// Bipolar speed knob curves.
pub mod varispeed;
/// Fade windows and crossfade curves.
pub mod window;

pub use buffer::CircularBuffer;
pub use envelope::{EnvelopeStage, GrainEnvelope};
pub use random::Random;
pub use smooth::SmoothedParam;
pub use varispeed::VarispeedCurve;
