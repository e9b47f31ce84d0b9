//! Dual-deck tape looper.

/*
Lubadh
======

Two identical decks, A and B, each a mono reel of up to ten minutes with a
vari-speed playhead (±4×), overdub recording and up to four extra taps.
A plays to the left output, B to the right.

Vocabulary
----------

  loop window   the part of the reel that plays, from the `start` and
                `length` knobs. Recomputed at the top of every block so the
                knobs can be modulated live.

  quantize      0 leaves the window free. Above that the reel is cut into
                1 + round(quantize × 31) equal divisions and both window
                edges snap to them.

  crossfade     width of the loop-edge crossfade, up to 250 ms.

  dub           how much of the old loop survives each overdub pass.

  tape          saturation, lowpass and wow/flutter, shared amount,
                separate state per deck.

  input blend   0 sends left to A and right to B; 1 sends the mono sum to
                both. With link on both decks always take the mono sum.

  link          B copies A's speed, start, length and dub whenever any
                knob changes.
*/

pub mod deck;
pub mod tape;

use tracing::info;

use crate::{
    config::EngineConfig,
    control::{
        params::{flag_name, mode_enum, param_enum, parse_flag},
        Deck, Event, EventSink, ModeMap, ParamMap, RecordSource, Transport,
    },
    dsp::{Random, SmoothedParam},
    engine::{Engine, EngineKind},
    error::EngineError,
    io::{AudioInput, AudioOutput},
};

use deck::{loop_window, DeckKnob, DeckSettings, LoopDeck};
pub use deck::MAX_TAPS;

param_enum! {
    pub enum Param {
        SpeedA => "speed_a", 0.75, 0.0..=1.0;
        SpeedB => "speed_b", 0.75, 0.0..=1.0;
        StartA => "start_a", 0.0, 0.0..=1.0;
        StartB => "start_b", 0.0, 0.0..=1.0;
        LengthA => "length_a", 1.0, 0.0..=1.0;
        LengthB => "length_b", 1.0, 0.0..=1.0;
        DubA => "dub_a", 0.9, 0.0..=1.0;
        DubB => "dub_b", 0.9, 0.0..=1.0;
        Tape => "tape", 0.0, 0.0..=1.0;
        Crossfade => "crossfade", 0.2, 0.0..=1.0;
        Quantize => "quantize", 0.0, 0.0..=1.0;
        InputBlend => "input_blend", 0.0, 0.0..=1.0;
        Mix => "mix", 1.0, 0.0..=1.0;
    }
}

mode_enum! {
    /// How recording lands on a loop that already has audio.
    pub enum RecordMode ("record_mode") {
        Overdub => "overdub",
        PunchIn => "punch_in",
    }
    default Overdub
}

impl Param {
    fn deck_knob(self) -> Option<(Deck, DeckKnob)> {
        Some(match self {
            Param::SpeedA => (Deck::A, DeckKnob::Speed),
            Param::SpeedB => (Deck::B, DeckKnob::Speed),
            Param::StartA => (Deck::A, DeckKnob::Start),
            Param::StartB => (Deck::B, DeckKnob::Start),
            Param::LengthA => (Deck::A, DeckKnob::Length),
            Param::LengthB => (Deck::B, DeckKnob::Length),
            Param::DubA => (Deck::A, DeckKnob::Dub),
            Param::DubB => (Deck::B, DeckKnob::Dub),
            _ => return None,
        })
    }
}

pub const LINK_FIELD: &str = "link";
pub const ONE_SHOT_FIELD: &str = "one_shot";
const DECK_KNOBS: [DeckKnob; 4] = [
    DeckKnob::Speed,
    DeckKnob::Start,
    DeckKnob::Length,
    DeckKnob::Dub,
];
const MAX_CROSSFADE_SECONDS: f32 = 0.25;
const MIN_LOOP_SECONDS: f32 = 0.001;
const MAX_DIVISIONS: f32 = 31.0;
const PARAM_SMOOTHING: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LubadhCommand {
    Set(Param, f32),
    RecordMode(RecordMode),
    Link(bool),
    OneShot(bool),
    Record(Deck, bool),
    /// Jump the deck back to its loop start.
    Retrigger(Deck),
    /// `offset` is the fraction of the loop behind the main head, `ratio`
    /// the tap's speed relative to it.
    AddTap { deck: Deck, offset: f32, ratio: f32 },
    RemoveTap { deck: Deck, index: usize },
    ClearDeck(Deck),
    Transport(Transport),
}

impl LubadhCommand {
    pub fn from_param(name: &str, value: f32) -> Option<Self> {
        Param::from_name(name).map(|p| LubadhCommand::Set(p, value))
    }

    pub fn from_mode(field: &str, value: &str) -> Option<Self> {
        match field {
            RecordMode::FIELD => RecordMode::from_name(value).map(LubadhCommand::RecordMode),
            LINK_FIELD => parse_flag(value).map(LubadhCommand::Link),
            ONE_SHOT_FIELD => parse_flag(value).map(LubadhCommand::OneShot),
            _ => None,
        }
    }

    pub fn defaults() -> Vec<Self> {
        let mut commands = vec![LubadhCommand::Link(false)];
        commands.extend(
            Param::ALL
                .iter()
                .map(|&p| LubadhCommand::Set(p, p.default_value())),
        );
        commands.push(LubadhCommand::RecordMode(RecordMode::default()));
        commands.push(LubadhCommand::OneShot(false));
        commands
    }
}

#[derive(Debug)]
pub struct Lubadh {
    sample_rate: f32,
    decks: [LoopDeck; 2],
    rng: Random,
    /// Raised by commands, emitted at the top of the next block.
    pending: [Option<Event>; 2],

    tape: f32,
    crossfade: f32,
    quantize: f32,
    input_blend: SmoothedParam,
    mix: SmoothedParam,

    record_mode: RecordMode,
    link: bool,
    one_shot: bool,
    frozen: bool,
    min_len: usize,
}

impl Lubadh {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let capacity = config.samples_for(config.lubadh_seconds);
        let decks = [
            LoopDeck::try_new(capacity, config.sample_rate, "lubadh deck a")?,
            LoopDeck::try_new(capacity, config.sample_rate, "lubadh deck b")?,
        ];
        info!(
            capacity,
            seconds = config.lubadh_seconds,
            "lubadh decks allocated"
        );

        let mut engine = Self {
            sample_rate: config.sample_rate,
            decks,
            rng: Random::from_seed(config.seed),
            pending: [None; 2],
            tape: Param::Tape.default_value(),
            crossfade: Param::Crossfade.default_value(),
            quantize: Param::Quantize.default_value(),
            input_blend: SmoothedParam::new(Param::InputBlend.default_value(), PARAM_SMOOTHING),
            mix: SmoothedParam::new(Param::Mix.default_value(), PARAM_SMOOTHING),
            record_mode: RecordMode::default(),
            link: false,
            one_shot: false,
            frozen: false,
            min_len: ((MIN_LOOP_SECONDS * config.sample_rate).round() as usize).max(1),
        };
        for param in Param::ALL {
            engine.set_param(*param, param.default_value());
        }
        for deck in &mut engine.decks {
            deck.snap();
        }
        Ok(engine)
    }

    /// Replace a deck's reel with prepared audio. Not for the audio thread.
    pub fn load_deck(&mut self, deck: Deck, samples: &[f32]) -> Result<(), EngineError> {
        self.decks[deck.index()].load(samples)?;
        info!(deck = deck.name(), samples = samples.len(), "lubadh deck loaded");
        Ok(())
    }

    pub fn deck(&self, deck: Deck) -> &LoopDeck {
        &self.decks[deck.index()]
    }

    /// `(start, length)` of a deck's loop for the current knobs.
    pub fn loop_window(&self, deck: Deck) -> (usize, usize) {
        let d = &self.decks[deck.index()];
        loop_window(
            d.recorded_length(),
            d.knob(DeckKnob::Start),
            d.knob(DeckKnob::Length),
            self.divisions(),
            self.min_len,
        )
    }

    pub fn min_loop_length(&self) -> usize {
        self.min_len
    }

    fn divisions(&self) -> Option<usize> {
        if self.quantize <= 0.0 {
            None
        } else {
            Some(1 + (self.quantize * MAX_DIVISIONS).round() as usize)
        }
    }

    fn settings(&self) -> DeckSettings {
        DeckSettings {
            fade_width: (self.crossfade * MAX_CROSSFADE_SECONDS * self.sample_rate) as f64,
            record_mode: self.record_mode,
            one_shot: self.one_shot,
            frozen: self.frozen,
        }
    }

    fn mirror_link(&mut self) {
        if !self.link {
            return;
        }
        let [a, b] = &mut self.decks;
        for knob in DECK_KNOBS {
            b.set_knob(knob, a.knob(knob));
        }
    }

    fn stop_recording(&mut self, deck: Deck) {
        if let Some(length) = self.decks[deck.index()].stop_recording() {
            self.pending[deck.index()] = Some(Event::RecordingStopped {
                source: RecordSource::Deck(deck),
                length,
            });
        }
    }

    fn set_param(&mut self, param: Param, value: f32) {
        let Some(value) = param.clamp(value) else {
            return;
        };
        if let Some((deck, knob)) = param.deck_knob() {
            self.decks[deck.index()].set_knob(knob, value);
            self.mirror_link();
            return;
        }
        match param {
            Param::Tape => {
                self.tape = value;
                for deck in &mut self.decks {
                    deck.tape_mut().set_amount(value, self.sample_rate);
                }
            }
            Param::Crossfade => self.crossfade = value,
            Param::Quantize => self.quantize = value,
            Param::InputBlend => self.input_blend.set_target(value),
            Param::Mix => self.mix.set_target(value),
            _ => {}
        }
        self.mirror_link();
    }
}

impl Engine for Lubadh {
    type Command = LubadhCommand;

    fn kind(&self) -> EngineKind {
        EngineKind::Lubadh
    }

    fn apply(&mut self, command: LubadhCommand) {
        match command {
            LubadhCommand::Set(param, value) => self.set_param(param, value),
            LubadhCommand::RecordMode(mode) => self.record_mode = mode,
            LubadhCommand::Link(on) => {
                self.link = on;
                self.mirror_link();
            }
            LubadhCommand::OneShot(on) => self.one_shot = on,
            LubadhCommand::Record(deck, true) => {
                if !self.frozen {
                    self.decks[deck.index()].start_recording();
                }
            }
            LubadhCommand::Record(deck, false) => self.stop_recording(deck),
            LubadhCommand::Retrigger(deck) => self.decks[deck.index()].retrigger(),
            LubadhCommand::AddTap { deck, offset, ratio } => {
                if offset.is_finite() && ratio.is_finite() {
                    self.decks[deck.index()].add_tap(offset, ratio);
                }
            }
            LubadhCommand::RemoveTap { deck, index } => {
                self.decks[deck.index()].remove_tap(index);
            }
            LubadhCommand::ClearDeck(deck) => {
                self.stop_recording(deck);
                self.decks[deck.index()].clear();
            }
            LubadhCommand::Transport(transport) => match transport {
                Transport::Freeze(on) => self.frozen = on,
                Transport::Purge => {
                    for deck in Deck::BOTH {
                        self.stop_recording(deck);
                        self.decks[deck.index()].clear();
                    }
                }
                Transport::Reset => {
                    for deck in &mut self.decks {
                        deck.retrigger();
                    }
                }
                Transport::SetBpm(_) | Transport::ClockPulse => {}
            },
        }
    }

    fn process<S: EventSink>(
        &mut self,
        input: &AudioInput<'_>,
        output: &mut AudioOutput<'_>,
        events: &mut S,
    ) {
        for slot in &mut self.pending {
            if let Some(event) = slot.take() {
                events.emit(event);
            }
        }

        let divisions = self.divisions();
        for deck in &mut self.decks {
            deck.update_window(divisions, self.min_len);
        }
        let settings = self.settings();

        for i in 0..output.frames() {
            let (in_l, in_r) = input.frame(i);
            let mono = 0.5 * (in_l + in_r);
            let blend = self.input_blend.next();
            let feeds = if self.link {
                [mono, mono]
            } else {
                [
                    in_l * (1.0 - blend) + mono * blend,
                    in_r * (1.0 - blend) + mono * blend,
                ]
            };

            let mut outs = [0.0f32; 2];
            for (d, deck) in self.decks.iter_mut().enumerate() {
                let frame = deck.next(feeds[d], &mut self.rng, &settings);
                if frame.looped {
                    events.emit(Event::LoopEnd {
                        deck: Deck::BOTH[d],
                    });
                }
                if let Some(length) = frame.stopped {
                    events.emit(Event::RecordingStopped {
                        source: RecordSource::Deck(Deck::BOTH[d]),
                        length,
                    });
                }
                outs[d] = frame.sample;
            }

            let mix = self.mix.next();
            output.write(
                i,
                in_l * (1.0 - mix) + outs[0] * mix,
                in_r * (1.0 - mix) + outs[1] * mix,
            );
        }
    }

    fn params(&self) -> ParamMap {
        Param::ALL
            .iter()
            .map(|&p| {
                let value = match p.deck_knob() {
                    Some((deck, knob)) => self.decks[deck.index()].knob(knob),
                    None => match p {
                        Param::Tape => self.tape,
                        Param::Crossfade => self.crossfade,
                        Param::Quantize => self.quantize,
                        Param::InputBlend => self.input_blend.target(),
                        _ => self.mix.target(),
                    },
                };
                (p.name().to_string(), value)
            })
            .collect()
    }

    fn modes(&self) -> ModeMap {
        [
            (RecordMode::FIELD, self.record_mode.name()),
            (LINK_FIELD, flag_name(self.link)),
            (ONE_SHOT_FIELD, flag_name(self.one_shot)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn param_command(&self, name: &str, value: f32) -> Option<LubadhCommand> {
        LubadhCommand::from_param(name, value)
    }

    fn mode_command(&self, field: &str, value: &str) -> Option<LubadhCommand> {
        LubadhCommand::from_mode(field, value)
    }

    fn default_commands(&self) -> Vec<LubadhCommand> {
        LubadhCommand::defaults()
    }

    fn reset(&mut self) {
        self.apply(LubadhCommand::Transport(Transport::Reset));
    }
}
