//! One looper deck: a mono reel, a main playhead and up to four taps.

/*
Loop Deck
=========

A deck records once to define its reel, then plays a loop window out of it.
The window is derived from the knobs every block:

    start  = floor(start_knob × recorded)
    length = floor(length_knob × (recorded − start))

optionally snapped to `recorded / divisions`, and never shorter than 1 ms.

Loop edges
----------

With a crossfade width `w` the head does not jump at the loop edge. Over
the last `w` samples it fades out while a partner head, reading from the
loop start, fades in. When the main head reaches the edge it carries on
from where the partner is:

    0        w                         len−w      len
    │  fade  │                           │  ╲      │
    │   in   │                           │ ╱ ╲out  │
    ├────────┼───────────────────────────┼─────────┤
             ▲                           partner: 0 → w
             └──── main continues here after the wrap

Backwards playback mirrors this at the loop start. A fresh start from 0
gets a plain fade in.

Recording
---------

The first recording on an empty deck appends and defines the reel length.
Later recordings write at the playhead inside the loop: overdub keeps
`existing × dub + input`, punch-in replaces.
*/

use crate::{
    dsp::{buffer::wrap, window::sqrt_fade, CircularBuffer, Random, SmoothedParam, VarispeedCurve},
    error::EngineError,
};

use super::{tape::Tape, RecordMode};

pub const MAX_TAPS: usize = 4;
const SPEED_SMOOTHING: f32 = 0.001;

/// The four knobs a deck has of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckKnob {
    Speed,
    Start,
    Length,
    Dub,
}

/// Per-block settings shared by both decks.
#[derive(Debug, Clone, Copy)]
pub struct DeckSettings {
    pub fade_width: f64,
    pub record_mode: RecordMode,
    pub one_shot: bool,
    pub frozen: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeckFrame {
    pub sample: f32,
    /// The main head crossed a loop edge.
    pub looped: bool,
    /// Recording stopped on this sample, with the reel length.
    pub stopped: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Tap {
    active: bool,
    position: f64,
    ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recorder {
    Idle,
    /// First pass on an empty deck.
    Append,
    /// Writing at the playhead.
    Dub,
}

/// Loop window for a reel of `recorded` samples.
///
/// `divisions` snaps both ends to a grid; `min_len` is the shortest loop.
pub fn loop_window(
    recorded: usize,
    start: f32,
    length: f32,
    divisions: Option<usize>,
    min_len: usize,
) -> (usize, usize) {
    if recorded == 0 {
        return (0, 0);
    }
    let rec = recorded as f64;
    let mut loop_start = (start.clamp(0.0, 1.0) as f64 * rec).floor();
    let mut loop_len = (length.clamp(0.0, 1.0) as f64 * (rec - loop_start)).floor();

    if let Some(divisions) = divisions.filter(|d| *d > 1) {
        let grid = rec / divisions as f64;
        loop_start = ((loop_start / grid).floor() * grid).floor();
        loop_len = ((loop_len / grid).round() * grid).floor();
    }

    let mut start = (loop_start as usize).min(recorded - 1);
    // a recording shorter than the floor loops as a whole
    let len = (loop_len as usize).max(min_len.max(1)).min(recorded);
    if start + len > recorded {
        start = recorded.saturating_sub(len);
    }
    (start, len)
}

#[derive(Debug, Clone)]
pub struct LoopDeck {
    buffer: CircularBuffer,
    recorded: usize,
    window: (usize, usize),
    position: f64,
    taps: [Tap; MAX_TAPS],
    tap_gain: f32,
    recorder: Recorder,
    tape: Tape,

    speed: SmoothedParam,
    start: f32,
    length: f32,
    dub: f32,
}

impl LoopDeck {
    pub fn try_new(
        capacity: usize,
        sample_rate: f32,
        what: &'static str,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            buffer: CircularBuffer::try_new(capacity, what)?,
            recorded: 0,
            window: (0, 0),
            position: 0.0,
            taps: [Tap::default(); MAX_TAPS],
            tap_gain: 1.0,
            recorder: Recorder::Idle,
            tape: Tape::new(sample_rate),
            speed: SmoothedParam::new(0.75, SPEED_SMOOTHING),
            start: 0.0,
            length: 1.0,
            dub: 0.9,
        })
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn recorded_length(&self) -> usize {
        self.recorded
    }

    pub fn window(&self) -> (usize, usize) {
        self.window
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn is_recording(&self) -> bool {
        self.recorder != Recorder::Idle
    }

    pub fn active_taps(&self) -> usize {
        self.taps.iter().filter(|t| t.active).count()
    }

    pub fn tap_gain(&self) -> f32 {
        self.tap_gain
    }

    pub fn tape_mut(&mut self) -> &mut Tape {
        &mut self.tape
    }

    /// Knob target as last set.
    pub fn knob(&self, knob: DeckKnob) -> f32 {
        match knob {
            DeckKnob::Speed => self.speed.target(),
            DeckKnob::Start => self.start,
            DeckKnob::Length => self.length,
            DeckKnob::Dub => self.dub,
        }
    }

    pub fn set_knob(&mut self, knob: DeckKnob, value: f32) {
        match knob {
            DeckKnob::Speed => self.speed.set_target(value),
            DeckKnob::Start => self.start = value,
            DeckKnob::Length => self.length = value,
            DeckKnob::Dub => self.dub = value,
        }
    }

    /// Replace the reel. Not for the audio thread.
    pub fn load(&mut self, samples: &[f32]) -> Result<(), EngineError> {
        self.buffer.load(samples)?;
        self.recorded = samples.len();
        self.recorder = Recorder::Idle;
        self.retrigger();
        Ok(())
    }

    /// Recompute the loop window from the knobs.
    pub fn update_window(&mut self, divisions: Option<usize>, min_len: usize) {
        self.window = loop_window(self.recorded, self.start, self.length, divisions, min_len);
        let len = self.window.1 as f64;
        self.position = wrap(self.position, len);
        for tap in &mut self.taps {
            tap.position = wrap(tap.position, len);
        }
    }

    pub fn start_recording(&mut self) {
        if self.is_recording() {
            return;
        }
        self.recorder = if self.recorded == 0 {
            Recorder::Append
        } else {
            Recorder::Dub
        };
    }

    /// Stop recording, returning the reel length if it was running.
    pub fn stop_recording(&mut self) -> Option<usize> {
        if !self.is_recording() {
            return None;
        }
        self.recorder = Recorder::Idle;
        Some(self.recorded)
    }

    pub fn retrigger(&mut self) {
        self.position = 0.0;
        for tap in &mut self.taps {
            tap.position = 0.0;
        }
    }

    /// Add a tap `offset` (fraction of the loop) behind the main head,
    /// running at `ratio` times its speed. False when all taps are busy.
    pub fn add_tap(&mut self, offset: f32, ratio: f32) -> bool {
        let len = self.window.1 as f64;
        let position = wrap(self.position - offset.clamp(0.0, 1.0) as f64 * len, len);
        let Some(tap) = self.taps.iter_mut().find(|t| !t.active) else {
            return false;
        };
        *tap = Tap {
            active: true,
            position,
            ratio: ratio.clamp(-4.0, 4.0) as f64,
        };
        self.renormalize();
        true
    }

    pub fn remove_tap(&mut self, index: usize) -> bool {
        match self.taps.get_mut(index) {
            Some(tap) if tap.active => {
                tap.active = false;
                self.renormalize();
                true
            }
            _ => false,
        }
    }

    fn renormalize(&mut self) {
        self.tap_gain = 1.0 / ((self.active_taps() + 1) as f32).sqrt();
    }

    /// Empty the reel and drop every tap.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.recorded = 0;
        self.window = (0, 0);
        self.recorder = Recorder::Idle;
        self.taps = [Tap::default(); MAX_TAPS];
        self.renormalize();
        self.position = 0.0;
        self.tape.reset();
    }

    /// Finish the speed glide.
    pub fn snap(&mut self) {
        self.speed.snap();
    }

    fn read_head(&self, width: f64, rate: f64) -> f32 {
        let (start, len) = self.window;
        let len_f = len as f64;
        let pos = self.position;
        let main = self.buffer.read_region(start, len, pos);
        if width < 1.0 {
            return main;
        }

        if rate >= 0.0 {
            if pos >= len_f - width {
                let (out, fade_in) = sqrt_fade(((pos - (len_f - width)) / width) as f32);
                let partner = self.buffer.read_region(start, len, pos - (len_f - width));
                return main * out + partner * fade_in;
            }
            if pos < width {
                return main * (pos / width).sqrt() as f32;
            }
        } else {
            if pos < width {
                let (out, fade_in) = sqrt_fade(((width - pos) / width) as f32);
                let partner = self.buffer.read_region(start, len, pos + len_f - width);
                return main * out + partner * fade_in;
            }
            if pos > len_f - width {
                return main * ((len_f - pos) / width).sqrt() as f32;
            }
        }
        main
    }

    /// Record and play one sample.
    pub fn next(&mut self, input: f32, rng: &mut Random, settings: &DeckSettings) -> DeckFrame {
        let knob = self.speed.next();
        let mut frame = DeckFrame::default();

        if self.recorder == Recorder::Append {
            if settings.frozen {
                return frame;
            }
            if self.recorded >= self.buffer.capacity() {
                frame.stopped = self.stop_recording();
            } else {
                self.buffer.write(self.recorded, input);
                self.recorded += 1;
            }
            return frame;
        }

        let (start, len) = self.window;
        if len == 0 {
            return frame;
        }
        let len_f = len as f64;
        let rate = VarispeedCurve::TAPE.rate(knob) as f64 * self.tape.rate_factor(rng) as f64;
        let width = settings.fade_width.min(len_f * 0.5);

        let head = self.read_head(width, rate);
        let mut taps = 0.0;
        for tap in self.taps.iter_mut().filter(|t| t.active) {
            taps += self.buffer.read_region(start, len, tap.position);
            tap.position = wrap(tap.position + rate * tap.ratio, len_f);
        }

        if self.recorder == Recorder::Dub && !settings.frozen {
            let at = start + (self.position as usize).min(len - 1);
            let value = match settings.record_mode {
                RecordMode::Overdub => self.buffer.read(at) * self.dub + input,
                RecordMode::PunchIn => input,
            };
            self.buffer.write(at, value);
        }

        let wrap_to = if width >= 1.0 { len_f - width } else { len_f };
        let mut next = self.position + rate;
        if rate > 0.0 && next >= len_f {
            next -= wrap_to;
            frame.looped = true;
        } else if rate < 0.0 && next < 0.0 {
            next += wrap_to;
            frame.looped = true;
        }
        self.position = wrap(next, len_f);

        if frame.looped && settings.one_shot && self.recorder == Recorder::Dub {
            frame.stopped = self.stop_recording();
        }

        frame.sample = self.tape.color((head + taps) * self.tap_gain);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 8_000.0;

    fn settings() -> DeckSettings {
        DeckSettings {
            fade_width: 0.0,
            record_mode: RecordMode::Overdub,
            one_shot: false,
            frozen: false,
        }
    }

    fn ramp_deck(len: usize) -> LoopDeck {
        let mut deck = LoopDeck::try_new(len * 2, SR, "test deck").unwrap();
        let data: Vec<f32> = (0..len).map(|i| i as f32 / len as f32).collect();
        deck.load(&data).unwrap();
        deck.update_window(None, 8);
        deck
    }

    fn knob_for(rate: f32) -> f32 {
        // inverse of the linear part of the tape curve
        let span = 0.5 - crate::dsp::varispeed::DEAD_ZONE;
        0.5 + rate.signum() * (crate::dsp::varispeed::DEAD_ZONE + span * 0.5 * rate.abs())
    }

    #[test]
    fn test_window_floor_is_one_millisecond() {
        let recorded = 10 * 48_000;
        assert_eq!(loop_window(recorded, 0.0, 0.0, None, 48), (0, 48));
        assert_eq!(loop_window(recorded, 1.0, 0.0, None, 48), (recorded - 48, 48));
        assert_eq!(loop_window(0, 0.3, 0.5, None, 48), (0, 0));
    }

    #[test]
    fn test_window_never_outgrows_recording() {
        for start in [0.0, 0.5, 1.0] {
            for length in [0.0, 0.5, 1.0] {
                let (s, len) = loop_window(20, start, length, None, 48);
                assert_eq!((s, len), (0, 20), "start {start} length {length}");
            }
        }
        assert_eq!(loop_window(1, 0.7, 0.0, Some(4), 48), (0, 1));
    }

    #[test]
    fn test_window_from_knobs() {
        assert_eq!(loop_window(1_000, 0.25, 0.5, None, 8), (250, 375));
        assert_eq!(loop_window(1_000, 0.0, 1.0, None, 8), (0, 1_000));
    }

    #[test]
    fn test_window_snaps_to_grid() {
        let (start, len) = loop_window(1_000, 0.27, 0.33, Some(10), 8);
        assert_eq!(start, 200);
        assert_eq!(len % 100, 0);
    }

    #[test]
    fn test_speed_sign_symmetry() {
        let mut deck = ramp_deck(1_000);
        deck.set_knob(DeckKnob::Speed, knob_for(0.6));
        deck.snap();
        let mut rng = Random::from_seed(3);
        for _ in 0..100 {
            deck.next(0.0, &mut rng, &settings());
        }

        let forward: Vec<f32> = (0..200)
            .map(|_| deck.next(0.0, &mut rng, &settings()).sample)
            .collect();
        deck.set_knob(DeckKnob::Speed, knob_for(-0.6));
        deck.snap();
        let backward: Vec<f32> = (0..=200)
            .map(|_| deck.next(0.0, &mut rng, &settings()).sample)
            .collect();

        for k in 0..200 {
            assert!(
                (forward[k] - backward[200 - k]).abs() < 1e-4,
                "{k}: {} vs {}",
                forward[k],
                backward[200 - k]
            );
        }
    }

    #[test]
    fn test_first_recording_defines_reel() {
        let mut deck = LoopDeck::try_new(100, SR, "test deck").unwrap();
        deck.start_recording();
        let mut rng = Random::from_seed(1);
        for _ in 0..40 {
            deck.next(0.5, &mut rng, &settings());
        }
        assert_eq!(deck.stop_recording(), Some(40));
        assert_eq!(deck.recorded_length(), 40);
    }

    #[test]
    fn test_first_recording_stops_at_capacity() {
        let mut deck = LoopDeck::try_new(50, SR, "test deck").unwrap();
        deck.start_recording();
        let mut rng = Random::from_seed(1);
        let stopped: Vec<_> = (0..60)
            .filter_map(|_| deck.next(0.5, &mut rng, &settings()).stopped)
            .collect();
        assert_eq!(stopped, vec![50]);
        assert!(!deck.is_recording());
    }

    #[test]
    fn test_overdub_and_punch_in() {
        let mut deck = LoopDeck::try_new(64, SR, "test deck").unwrap();
        deck.load(&[1.0; 32]).unwrap();
        deck.set_knob(DeckKnob::Dub, 0.5);
        deck.set_knob(DeckKnob::Speed, knob_for(1.0));
        deck.snap();
        deck.update_window(None, 8);
        let mut rng = Random::from_seed(1);

        deck.start_recording();
        for _ in 0..32 {
            deck.next(0.25, &mut rng, &settings());
        }
        assert!((deck.buffer.read(5) - 0.75).abs() < 1e-6);

        let punch = DeckSettings {
            record_mode: RecordMode::PunchIn,
            ..settings()
        };
        for _ in 0..32 {
            deck.next(-0.1, &mut rng, &punch);
        }
        assert!((deck.buffer.read(5) + 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_one_shot_stops_at_loop_end() {
        let mut deck = ramp_deck(100);
        deck.set_knob(DeckKnob::Speed, knob_for(1.0));
        deck.snap();
        let one_shot = DeckSettings {
            one_shot: true,
            ..settings()
        };
        let mut rng = Random::from_seed(1);
        deck.start_recording();
        let stops: Vec<usize> = (0..250)
            .filter_map(|i| deck.next(0.0, &mut rng, &one_shot).stopped.map(|_| i))
            .collect();
        assert_eq!(stops.len(), 1);
        assert!((98..=100).contains(&stops[0]), "{stops:?}");
    }

    #[test]
    fn test_crossfaded_wrap_is_continuous() {
        let mut deck = LoopDeck::try_new(2_000, SR, "test deck").unwrap();
        let data: Vec<f32> = (0..1_000).map(|i| (i as f32 * 0.0314).sin()).collect();
        deck.load(&data).unwrap();
        deck.set_knob(DeckKnob::Speed, knob_for(1.0));
        deck.snap();
        deck.update_window(None, 8);
        let faded = DeckSettings {
            fade_width: 100.0,
            ..settings()
        };
        let mut rng = Random::from_seed(1);
        let out: Vec<f32> = (0..3_000)
            .map(|_| deck.next(0.0, &mut rng, &faded).sample)
            .collect();
        // past the initial fade in, neighbouring samples never jump
        for pair in out[200..].windows(2) {
            assert!((pair[1] - pair[0]).abs() < 0.1, "{pair:?}");
        }
    }

    #[test]
    fn test_taps_renormalize() {
        let mut deck = ramp_deck(1_000);
        assert_eq!(deck.tap_gain(), 1.0);
        assert!(deck.add_tap(0.25, 1.0));
        assert!((deck.tap_gain() - 0.5f32.sqrt()).abs() < 1e-6);
        for _ in 0..3 {
            assert!(deck.add_tap(0.5, -1.0));
        }
        assert!(!deck.add_tap(0.5, 1.0));
        assert!((deck.tap_gain() - 0.2f32.sqrt()).abs() < 1e-6);
        assert!(deck.remove_tap(2));
        assert!(!deck.remove_tap(2));
        assert_eq!(deck.active_taps(), 3);
        assert!((deck.tap_gain() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_deck_is_silent() {
        let mut deck = LoopDeck::try_new(100, SR, "test deck").unwrap();
        deck.update_window(None, 8);
        let mut rng = Random::from_seed(1);
        for _ in 0..50 {
            assert_eq!(deck.next(0.7, &mut rng, &settings()).sample, 0.0);
        }
    }
}
