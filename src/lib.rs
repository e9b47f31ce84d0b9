pub mod config;
pub mod control; // Typed commands, events, parameter catalogues
pub mod dsp;
pub mod engine; // The four effect units and their host
pub mod error;
pub mod io;
pub mod preset;

pub use config::EngineConfig;
pub use error::EngineError;

pub const MAX_BLOCK_SIZE: usize = 2048;
