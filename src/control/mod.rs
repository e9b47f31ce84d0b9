//! Typed control plane: commands in, events out, parameter catalogues.

pub mod message;
pub mod params;

pub use message::{
    CommandReceiver, Deck, Discard, Event, EventSink, Levels, RecordSource, Transport,
};
pub use params::{ModeMap, ParamMap, ParamResolver};
