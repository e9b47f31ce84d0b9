//! Whole-engine benchmarks.
//!
//! Each engine runs with settings that keep its most expensive paths busy:
//! overlapping grains, all eight delay lines, both decks with extra taps.

mod engines;

pub use engines::bench_engines;
