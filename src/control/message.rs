//! Messages crossing the control/audio thread boundary.
//!
//! Commands flow control → audio, events flow audio → control. Both sides
//! are plain `Copy` values so they fit a lock-free ring without allocation.

#[cfg(feature = "rtrb")]
use rtrb::{Consumer, Producer};

use std::collections::VecDeque;

/// Transport and clock commands understood by every engine.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Transport {
    /// Stop writing new audio (or loop a snapshot) while held.
    Freeze(bool),
    /// Clear buffers and filter memory.
    Purge,
    /// Restart playback state without touching recorded audio.
    Reset,
    SetBpm(f32),
    ClockPulse,
}

/// One of the two looper decks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Deck {
    A,
    B,
}

impl Deck {
    pub const BOTH: [Deck; 2] = [Deck::A, Deck::B];

    pub fn index(self) -> usize {
        match self {
            Deck::A => 0,
            Deck::B => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Deck::A => "a",
            Deck::B => "b",
        }
    }
}

/// Which recorder stopped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordSource {
    /// The granular reel, with the splice that was being written.
    Reel { splice: usize },
    Deck(Deck),
}

/// Peak levels of the last metering window.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Levels {
    pub left: f32,
    pub right: f32,
}

/// Fire-and-forget notifications from the audio thread.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Event {
    RecordingStopped { source: RecordSource, length: usize },
    LoopEnd { deck: Deck },
    EndOfGene,
    ClockDivision,
    FreezeComplete { length: usize },
    Meter(Levels),
}

/// Source of commands drained at the top of every block.
pub trait CommandReceiver<C> {
    fn pop(&mut self) -> Option<C>;
}

#[cfg(feature = "rtrb")]
impl<C> CommandReceiver<C> for Consumer<C> {
    fn pop(&mut self) -> Option<C> {
        Consumer::pop(self).ok()
    }
}

/// For hosts that deliver commands between blocks on the same thread.
impl<C> CommandReceiver<C> for VecDeque<C> {
    fn pop(&mut self) -> Option<C> {
        self.pop_front()
    }
}

/// Destination for events. Implementations must not block; dropping an
/// event is always acceptable.
pub trait EventSink {
    fn emit(&mut self, event: Event);
}

#[cfg(feature = "rtrb")]
impl EventSink for Producer<Event> {
    fn emit(&mut self, event: Event) {
        // full queue: the control side is behind, drop it
        let _ = self.push(event);
    }
}

/// Collects everything. Allocates, so meant for offline rendering and tests.
impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

/// Throws every event away.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _event: Event) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vecdeque_receiver_is_fifo() {
        let mut queue: VecDeque<Transport> = VecDeque::new();
        queue.push_back(Transport::Purge);
        queue.push_back(Transport::ClockPulse);
        assert_eq!(CommandReceiver::pop(&mut queue), Some(Transport::Purge));
        assert_eq!(CommandReceiver::pop(&mut queue), Some(Transport::ClockPulse));
        assert_eq!(CommandReceiver::pop(&mut queue), None);
    }

    #[cfg(feature = "rtrb")]
    #[test]
    fn test_full_event_queue_drops() {
        let (mut producer, mut consumer) = rtrb::RingBuffer::<Event>::new(2);
        for _ in 0..5 {
            producer.emit(Event::EndOfGene);
        }
        assert_eq!(consumer.slots(), 2);
        assert_eq!(consumer.pop().ok(), Some(Event::EndOfGene));
    }

    #[cfg(feature = "rtrb")]
    #[test]
    fn test_rtrb_consumer_receives_commands() {
        let (mut producer, mut consumer) = rtrb::RingBuffer::<Transport>::new(4);
        producer.push(Transport::SetBpm(120.0)).unwrap();
        assert_eq!(
            CommandReceiver::pop(&mut consumer),
            Some(Transport::SetBpm(120.0))
        );
    }
}
