//! Benchmarks for low-level DSP primitives.

mod buffer;
mod distortion;
mod envelope;
mod filter;
mod pitch_shift;
mod reverb;

pub use buffer::bench_buffer;
pub use distortion::bench_distortion;
pub use envelope::bench_envelope;
pub use filter::bench_filter;
pub use pitch_shift::bench_pitch_shift;
pub use reverb::bench_reverb;
