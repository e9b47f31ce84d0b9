//! Tape glitcher: a rolling record buffer replayed in bent, broken slices.

/*
Databender
==========

The input is recorded continuously into a 65 second ring. Playback never
reads the live head directly; instead it replays a window of recent audio
that is latched at the start of every cycle.

Vocabulary
----------

  active length   how much recent audio one cycle covers. Internal clock:
                  16 s at time = 0 down to 1/80 s at time = 1. External
                  clock: a division or multiple of one beat.

  repeat          one of 1..16 equal slices of the window. The playhead
                  runs through one repeat at a time, then steps to the
                  next (or previous, when playing backwards).

  cycle           all repeats played once. A new window is latched from
                  the write head and `Event::ClockDivision` is emitted.

        write head ───────────────────────────────────────────┐
                                                              ▼
    ring  ···········|  r0  |  r1  |  r2  |  r3  |············●·····
                     └──────── active length ─────┘
                     ▲
                window start, latched each cycle

Macro mode re-rolls bend and break at every repeat boundary (see
`macro_roll`). Micro mode hands both knobs straight to the player: bend is
speed, break picks the repeat.

Each repeat (or stutter piece of one) is faded in and out with a raised
cosine, then corrupted, then mixed with the dry input.
*/

pub mod corrupt;
pub mod macro_roll;

use tracing::info;

use crate::{
    config::EngineConfig,
    control::{
        params::{flag_name, mode_enum, param_enum, parse_flag},
        Event, EventSink, ModeMap, ParamMap, Transport,
    },
    dsp::{buffer::wrap_index, window::segment_fade, CircularBuffer, Random, SmoothedParam},
    engine::{Engine, EngineKind},
    error::EngineError,
    io::{AudioInput, AudioOutput},
};

pub use corrupt::{CorruptType, Corruptor};
use macro_roll::Roll;

param_enum! {
    pub enum Param {
        Time => "time", 0.5, 0.0..=1.0;
        Repeats => "repeats", 0.0, 0.0..=1.0;
        Mix => "mix", 0.5, 0.0..=1.0;
        Bend => "bend", 0.0, 0.0..=1.0;
        Break => "break", 0.0, 0.0..=1.0;
        Corrupt => "corrupt", 0.0, 0.0..=1.0;
        Window => "window", 0.1, 0.0..=1.0;
        InputGain => "input_gain", 1.0, 0.0..=2.0;
    }
}

mode_enum! {
    pub enum OperationMode ("operation_mode") {
        Macro => "macro",
        Micro => "micro",
    }
    default Macro
}

mode_enum! {
    pub enum ClockMode ("clock_mode") {
        Internal => "internal",
        External => "external",
    }
    default Internal
}

pub const REVERSE_FIELD: &str = "reverse";

/// Beat multiples selectable with `time` under an external clock.
pub const DIVISIONS: [f32; 10] = [
    1.0 / 16.0,
    1.0 / 8.0,
    1.0 / 4.0,
    1.0 / 3.0,
    1.0 / 2.0,
    1.0,
    2.0,
    3.0,
    4.0,
    8.0,
];

const MAX_REPEATS: f32 = 16.0;
const LONGEST_CYCLE_SECONDS: f32 = 16.0;
const SHORTEST_CYCLE_RATIO: f32 = 1.0 / 1280.0;
const MIN_BPM: f32 = 20.0;
const MAX_BPM: f32 = 300.0;
const DEFAULT_BPM: f32 = 120.0;
/// Floor for the boundary fade so even tiny windows do not click.
const MIN_FADE_SECONDS: f64 = 0.001;
/// Per-sample approach rate of a gliding macro speed.
const GLIDE_RATE: f64 = 0.0005;

const LENGTH_SMOOTHING: f32 = 0.0001;
const PARAM_SMOOTHING: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DatabenderCommand {
    Set(Param, f32),
    OperationMode(OperationMode),
    ClockMode(ClockMode),
    CorruptType(CorruptType),
    /// Playback direction in micro mode.
    Reverse(bool),
    Transport(Transport),
}

impl DatabenderCommand {
    pub fn from_param(name: &str, value: f32) -> Option<Self> {
        Param::from_name(name).map(|p| DatabenderCommand::Set(p, value))
    }

    pub fn from_mode(field: &str, value: &str) -> Option<Self> {
        match field {
            OperationMode::FIELD => {
                OperationMode::from_name(value).map(DatabenderCommand::OperationMode)
            }
            ClockMode::FIELD => ClockMode::from_name(value).map(DatabenderCommand::ClockMode),
            CorruptType::FIELD => CorruptType::from_name(value).map(DatabenderCommand::CorruptType),
            REVERSE_FIELD => parse_flag(value).map(DatabenderCommand::Reverse),
            _ => None,
        }
    }

    pub fn defaults() -> Vec<Self> {
        let mut commands: Vec<Self> = Param::ALL
            .iter()
            .map(|&p| DatabenderCommand::Set(p, p.default_value()))
            .collect();
        commands.push(DatabenderCommand::OperationMode(OperationMode::default()));
        commands.push(DatabenderCommand::ClockMode(ClockMode::default()));
        commands.push(DatabenderCommand::CorruptType(CorruptType::default()));
        commands.push(DatabenderCommand::Reverse(false));
        commands
    }
}

#[derive(Debug)]
pub struct Databender {
    sample_rate: f32,
    buffers: [CircularBuffer; 2],
    write_pos: usize,
    frozen: bool,
    rng: Random,

    // knobs
    time: f32,
    repeats: f32,
    brk: f32,
    window: f32,
    bend: SmoothedParam,
    mix: SmoothedParam,
    corrupt: SmoothedParam,
    input_gain: SmoothedParam,

    operation: OperationMode,
    clock_mode: ClockMode,
    corrupt_type: CorruptType,
    reverse: bool,

    // clock
    bpm: f32,
    since_pulse: Option<u64>,
    active_len: SmoothedParam,

    // playhead
    window_start: usize,
    repeat_index: usize,
    repeats_played: usize,
    phase: f64,
    roll: Roll,
    speed: f64,
    stop_gain: f64,

    corruptor: Corruptor,
}

impl Databender {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let capacity = config.samples_for(config.databender_seconds).max(4);
        let buffers = [
            CircularBuffer::try_new(capacity, "databender left")?,
            CircularBuffer::try_new(capacity, "databender right")?,
        ];

        let mut engine = Self {
            sample_rate: config.sample_rate,
            buffers,
            write_pos: 0,
            frozen: false,
            rng: Random::from_seed(config.seed),
            time: Param::Time.default_value(),
            repeats: Param::Repeats.default_value(),
            brk: Param::Break.default_value(),
            window: Param::Window.default_value(),
            bend: SmoothedParam::new(Param::Bend.default_value(), PARAM_SMOOTHING),
            mix: SmoothedParam::new(Param::Mix.default_value(), PARAM_SMOOTHING),
            corrupt: SmoothedParam::new(Param::Corrupt.default_value(), PARAM_SMOOTHING),
            input_gain: SmoothedParam::new(Param::InputGain.default_value(), PARAM_SMOOTHING),
            operation: OperationMode::default(),
            clock_mode: ClockMode::default(),
            corrupt_type: CorruptType::default(),
            reverse: false,
            bpm: DEFAULT_BPM,
            since_pulse: None,
            active_len: SmoothedParam::new(1.0, LENGTH_SMOOTHING),
            window_start: 0,
            repeat_index: 0,
            repeats_played: 0,
            phase: 0.0,
            roll: Roll::default(),
            speed: 1.0,
            stop_gain: 1.0,
            corruptor: Corruptor::new(config.sample_rate),
        };
        engine.active_len = SmoothedParam::new(engine.target_length(), LENGTH_SMOOTHING);
        engine.start_cycle();

        info!(
            capacity,
            seconds = config.databender_seconds,
            "databender buffers allocated"
        );
        Ok(engine)
    }

    fn capacity(&self) -> usize {
        self.buffers[0].capacity()
    }

    /// Target window size in samples for the current clock settings.
    fn target_length(&self) -> f32 {
        let seconds = match self.clock_mode {
            ClockMode::Internal => LONGEST_CYCLE_SECONDS * SHORTEST_CYCLE_RATIO.powf(self.time),
            ClockMode::External => {
                let division = DIVISIONS[((self.time * 9.0).round() as usize).min(9)];
                60.0 / self.bpm * division
            }
        };
        (seconds * self.sample_rate).clamp(2.0, (self.capacity() - 1) as f32)
    }

    fn retarget_length(&mut self) {
        let target = self.target_length();
        self.active_len.set_target(target);
    }

    pub fn repeat_count(&self) -> usize {
        1 + (self.repeats * (MAX_REPEATS - 1.0)).round() as usize
    }

    /// Smoothed window length in samples.
    pub fn active_length(&self) -> f32 {
        self.active_len.current()
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// Latch a new window ending at the write head and start from its first
    /// (or, backwards, last) repeat.
    fn start_cycle(&mut self) {
        let len = self.active_len.current() as isize;
        self.window_start = wrap_index(self.write_pos as isize - len, self.capacity());
        self.repeats_played = 0;
        self.repeat_index = if self.direction() < 0.0 {
            self.repeat_count() - 1
        } else {
            0
        };
    }

    fn direction(&self) -> f64 {
        match self.operation {
            OperationMode::Macro => self.roll.direction,
            OperationMode::Micro => {
                if self.reverse {
                    -1.0
                } else {
                    1.0
                }
            }
        }
    }

    fn micro_index(&self, repeats: usize) -> usize {
        ((self.brk * repeats as f32).floor() as usize).min(repeats - 1)
    }

    /// Signed playback speed for this sample.
    fn playback_speed(&mut self, bend: f32, repeat_len: f64) -> f64 {
        match self.operation {
            OperationMode::Micro => {
                let speed = 2.0f64.powf((bend as f64 - 0.5) * 4.0);
                self.direction() * speed
            }
            OperationMode::Macro => {
                if self.roll.glide {
                    self.speed += (self.roll.speed - self.speed) * GLIDE_RATE;
                }
                if self.roll.tape_stop {
                    self.stop_gain = (self.stop_gain - 1.0 / repeat_len).max(0.0);
                }
                self.roll.direction * self.speed * self.stop_gain
            }
        }
    }

    fn repeat_boundary<S: EventSink>(&mut self, step: isize, repeats: usize, events: &mut S) {
        let previous = self.repeat_index;
        self.repeats_played += 1;
        let cycle_done = self.repeats_played >= repeats;
        if cycle_done {
            self.start_cycle();
            events.emit(Event::ClockDivision);
        } else {
            self.repeat_index = wrap_index(previous as isize + step, repeats);
        }

        match self.operation {
            OperationMode::Macro => {
                self.roll = macro_roll::roll(self.bend.current(), self.brk, repeats, &mut self.rng);
                if !self.roll.glide {
                    self.speed = self.roll.speed;
                }
                self.stop_gain = 1.0;
                if self.roll.extra_repeat && !cycle_done {
                    self.repeat_index = previous;
                    self.repeats_played -= 1;
                } else if let Some(jump) = self.roll.jump {
                    self.repeat_index = jump;
                }
            }
            OperationMode::Micro => {
                if self.brk > 0.0 {
                    self.repeat_index = self.micro_index(repeats);
                }
            }
        }
    }

    fn handle_pulse(&mut self) {
        if let Some(interval) = self.since_pulse {
            if interval > 0 {
                let bpm = 60.0 * self.sample_rate / interval as f32;
                if (MIN_BPM..=MAX_BPM).contains(&bpm) {
                    self.bpm = bpm;
                    self.retarget_length();
                }
            }
        }
        self.since_pulse = Some(0);
        if self.clock_mode == ClockMode::External {
            self.phase = 0.0;
            self.start_cycle();
        }
    }

    fn restart(&mut self) {
        self.roll = Roll::default();
        self.speed = 1.0;
        self.stop_gain = 1.0;
        self.phase = 0.0;
        self.start_cycle();
    }

    fn set_param(&mut self, param: Param, value: f32) {
        let Some(value) = param.clamp(value) else {
            return;
        };
        match param {
            Param::Time => {
                self.time = value;
                self.retarget_length();
            }
            Param::Repeats => self.repeats = value,
            Param::Mix => self.mix.set_immediate(value),
            Param::Bend => self.bend.set_target(value),
            Param::Break => self.brk = value,
            Param::Corrupt => self.corrupt.set_target(value),
            Param::Window => self.window = value,
            Param::InputGain => self.input_gain.set_target(value),
        }
    }
}

impl Engine for Databender {
    type Command = DatabenderCommand;

    fn kind(&self) -> EngineKind {
        EngineKind::Databender
    }

    fn apply(&mut self, command: DatabenderCommand) {
        match command {
            DatabenderCommand::Set(param, value) => self.set_param(param, value),
            DatabenderCommand::OperationMode(mode) => {
                if mode != self.operation {
                    self.operation = mode;
                    self.roll = Roll::default();
                    self.speed = 1.0;
                    self.stop_gain = 1.0;
                }
            }
            DatabenderCommand::ClockMode(mode) => {
                self.clock_mode = mode;
                self.retarget_length();
            }
            DatabenderCommand::CorruptType(kind) => self.corrupt_type = kind,
            DatabenderCommand::Reverse(on) => self.reverse = on,
            DatabenderCommand::Transport(transport) => match transport {
                Transport::Freeze(on) => self.frozen = on,
                Transport::Purge => {
                    for buffer in &mut self.buffers {
                        buffer.clear();
                    }
                    self.corruptor.reset();
                    self.restart();
                }
                Transport::Reset => self.restart(),
                Transport::SetBpm(bpm) => {
                    if bpm.is_finite() {
                        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
                        self.retarget_length();
                    }
                }
                Transport::ClockPulse => self.handle_pulse(),
            },
        }
    }

    fn process<S: EventSink>(
        &mut self,
        input: &AudioInput<'_>,
        output: &mut AudioOutput<'_>,
        events: &mut S,
    ) {
        let capacity = self.capacity();
        let min_fade = MIN_FADE_SECONDS * self.sample_rate as f64;

        for i in 0..output.frames() {
            let gain = self.input_gain.next();
            let (in_l, in_r) = input.frame(i);
            let (in_l, in_r) = (in_l * gain, in_r * gain);

            if !self.frozen {
                self.buffers[0].write(self.write_pos, in_l);
                self.buffers[1].write(self.write_pos, in_r);
                self.write_pos = (self.write_pos + 1) % capacity;
            }
            if let Some(n) = self.since_pulse.as_mut() {
                *n += 1;
            }

            let bend = self.bend.next();
            let active_len = self.active_len.next() as f64;
            let repeats = self.repeat_count();
            let repeat_len = (active_len / repeats as f64).max(1.0);
            let index = self.repeat_index.min(repeats - 1);

            let stutter = match self.operation {
                OperationMode::Macro => self.roll.stutter as f64,
                OperationMode::Micro => 1.0,
            };
            let segment_len = (repeat_len / stutter).max(1.0);
            let offset = (self.phase * repeat_len) % segment_len;

            let position = self.window_start as f64 + index as f64 * repeat_len + offset;
            let fade = segment_fade(
                offset,
                segment_len,
                (self.window as f64 * segment_len).max(min_fade),
            );
            let mut wet = (
                self.buffers[0].read_interpolated(position, capacity) * fade,
                self.buffers[1].read_interpolated(position, capacity) * fade,
            );
            if self.operation == OperationMode::Macro && self.roll.silence {
                wet = (0.0, 0.0);
            }

            let amount = self.corrupt.next();
            let (wet_l, wet_r) =
                self.corruptor
                    .process(wet, self.corrupt_type, amount, &mut self.rng);

            let mix = self.mix.next();
            output.write(
                i,
                in_l * (1.0 - mix) + wet_l * mix,
                in_r * (1.0 - mix) + wet_r * mix,
            );

            let speed = self.playback_speed(bend, repeat_len);
            self.phase += speed / repeat_len;
            if self.phase >= 1.0 {
                self.phase = self.phase.rem_euclid(1.0);
                self.repeat_boundary(1, repeats, events);
            } else if self.phase < 0.0 {
                self.phase = self.phase.rem_euclid(1.0);
                self.repeat_boundary(-1, repeats, events);
            } else if self.roll.tape_stop && self.stop_gain <= 0.0 {
                // tape fully stopped: move on rather than hang
                self.phase = 0.0;
                self.repeat_boundary(1, repeats, events);
            }
        }
    }

    fn params(&self) -> ParamMap {
        Param::ALL
            .iter()
            .map(|&p| {
                let value = match p {
                    Param::Time => self.time,
                    Param::Repeats => self.repeats,
                    Param::Mix => self.mix.target(),
                    Param::Bend => self.bend.target(),
                    Param::Break => self.brk,
                    Param::Corrupt => self.corrupt.target(),
                    Param::Window => self.window,
                    Param::InputGain => self.input_gain.target(),
                };
                (p.name().to_string(), value)
            })
            .collect()
    }

    fn modes(&self) -> ModeMap {
        [
            (OperationMode::FIELD, self.operation.name()),
            (ClockMode::FIELD, self.clock_mode.name()),
            (CorruptType::FIELD, self.corrupt_type.name()),
            (REVERSE_FIELD, flag_name(self.reverse)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn param_command(&self, name: &str, value: f32) -> Option<DatabenderCommand> {
        DatabenderCommand::from_param(name, value)
    }

    fn mode_command(&self, field: &str, value: &str) -> Option<DatabenderCommand> {
        DatabenderCommand::from_mode(field, value)
    }

    fn default_commands(&self) -> Vec<DatabenderCommand> {
        DatabenderCommand::defaults()
    }

    fn reset(&mut self) {
        self.restart();
    }
}
