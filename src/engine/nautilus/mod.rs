//! Eight-line delay network with feedback routing, colour and reverb.

/*
Nautilus
========

Eight delay lines, four per side:

    left    0  1  2  3
    right   4  5  6  7

Vocabulary
----------

  time        base delay, 128 samples at 0 up to the full ring at 1 on a
              log curve.

  dispersal   spreads the lines on a side apart: line k on its side uses
              base × (1 + dispersal × k).

  sensors     how many lines listen, 1 to 8. They switch on alternating
              sides: 0, 4, 1, 5, 2, 6, 3, 7.

  feedback    how much of each line's output goes back in, capped at 0.99
              so the network always decays.

Feedback routing decides whose output a line hears:

  normal       itself
  ping pong    its partner on the other side (0↔4, 1↔5, ...)
  cascade      the previous line on its side: 3→0→1→2→3, 7→4→5→6→7
  adrift       one chain across both sides: 0→4→1→5→2→6→3→7→0

In cascade and adrift only the chain heads (0 and 4) take the input, so
the sound travels down the chain instead of entering everywhere at once.

Per sample, every line is read first and then every line is written, so
routing never depends on line order:

    read all ──→ route ──→ chroma ──→ (shimmer) ──→ × feedback ──→ write all
       │
       └──→ sum per side ──→ reverb send ──→ mix with dry

Freeze copies the last `delay` samples of lines 0 and 4 and loops the copy
instead of the live lines until released.
*/

pub mod chroma;
pub mod line;

use tracing::info;

use crate::{
    config::EngineConfig,
    control::{
        params::{mode_enum, param_enum},
        Event, EventSink, ModeMap, ParamMap, Transport,
    },
    dsp::{pitch_shift::PitchShifter, reverb::ReverbPreset, reverb::StereoReverb, SmoothedParam},
    engine::{Engine, EngineKind},
    error::EngineError,
    io::{AudioInput, AudioOutput},
};

pub use chroma::{Chroma, ChromaType};
use line::{DelayLine, Transition, MIN_DELAY};

param_enum! {
    pub enum Param {
        Mix => "mix", 0.5, 0.0..=1.0;
        Time => "time", 0.5, 0.0..=1.0;
        Feedback => "feedback", 0.5, 0.0..=1.0;
        Dispersal => "dispersal", 0.0, 0.0..=1.0;
        Sensors => "sensors", 1.0, 0.0..=1.0;
        Depth => "depth", 0.0, 0.0..=1.0;
        Reverb => "reverb", 0.0, 0.0..=1.0;
    }
}

mode_enum! {
    pub enum DelayMode ("delay_mode") {
        Fade => "fade",
        Doppler => "doppler",
        Shimmer => "shimmer",
        Deshimmer => "deshimmer",
    }
    default Fade
}

mode_enum! {
    pub enum FeedbackMode ("feedback_mode") {
        Normal => "normal",
        PingPong => "ping_pong",
        Cascade => "cascade",
        Adrift => "adrift",
    }
    default Normal
}

pub const LINES: usize = 8;
pub const LINES_PER_SIDE: usize = LINES / 2;
pub const MAX_FEEDBACK: f32 = 0.99;

/// Order in which lines switch on as `sensors` rises.
const ACTIVATION_ORDER: [usize; LINES] = [0, 4, 1, 5, 2, 6, 3, 7];
const ADRIFT_CHAIN: [usize; LINES] = [0, 4, 1, 5, 2, 6, 3, 7];
const SHIMMER_SEMITONES: f32 = 12.0;
const PARAM_SMOOTHING: f32 = 0.001;

impl DelayMode {
    fn transition(self) -> Transition {
        match self {
            DelayMode::Fade => Transition::Fade,
            DelayMode::Doppler => Transition::Glide,
            DelayMode::Shimmer | DelayMode::Deshimmer => Transition::Snap,
        }
    }
}

impl FeedbackMode {
    /// The line whose output feeds line `j`.
    pub fn source(self, j: usize) -> usize {
        let side = j / LINES_PER_SIDE * LINES_PER_SIDE;
        match self {
            FeedbackMode::Normal => j,
            FeedbackMode::PingPong => (j + LINES_PER_SIDE) % LINES,
            FeedbackMode::Cascade => side + (j + LINES_PER_SIDE - 1) % LINES_PER_SIDE,
            FeedbackMode::Adrift => {
                let k = ADRIFT_CHAIN.iter().position(|&l| l == j).unwrap_or(0);
                ADRIFT_CHAIN[(k + LINES - 1) % LINES]
            }
        }
    }

    /// Whether line `j` takes the input.
    pub fn takes_input(self, j: usize) -> bool {
        match self {
            FeedbackMode::Normal | FeedbackMode::PingPong => true,
            FeedbackMode::Cascade | FeedbackMode::Adrift => j % LINES_PER_SIDE == 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NautilusCommand {
    Set(Param, f32),
    DelayMode(DelayMode),
    FeedbackMode(FeedbackMode),
    ChromaType(ChromaType),
    ReverbPreset(ReverbPreset),
    Transport(Transport),
}

impl NautilusCommand {
    pub fn from_param(name: &str, value: f32) -> Option<Self> {
        Param::from_name(name).map(|p| NautilusCommand::Set(p, value))
    }

    pub fn from_mode(field: &str, value: &str) -> Option<Self> {
        match field {
            DelayMode::FIELD => DelayMode::from_name(value).map(NautilusCommand::DelayMode),
            FeedbackMode::FIELD => FeedbackMode::from_name(value).map(NautilusCommand::FeedbackMode),
            ChromaType::FIELD => ChromaType::from_name(value).map(NautilusCommand::ChromaType),
            ReverbPreset::FIELD => ReverbPreset::from_name(value).map(NautilusCommand::ReverbPreset),
            _ => None,
        }
    }

    pub fn defaults() -> Vec<Self> {
        let mut commands: Vec<Self> = Param::ALL
            .iter()
            .map(|&p| NautilusCommand::Set(p, p.default_value()))
            .collect();
        commands.push(NautilusCommand::DelayMode(DelayMode::default()));
        commands.push(NautilusCommand::FeedbackMode(FeedbackMode::default()));
        commands.push(NautilusCommand::ChromaType(ChromaType::default()));
        commands.push(NautilusCommand::ReverbPreset(ReverbPreset::default()));
        commands
    }
}

/// Looping copy of the two head lines.
#[derive(Debug)]
struct FreezeLoop {
    left: Vec<f32>,
    right: Vec<f32>,
    len: usize,
    pos: usize,
    active: bool,
}

#[derive(Debug)]
pub struct Nautilus {
    sample_rate: f32,
    lines: Vec<DelayLine>,
    chroma: [Chroma; LINES],
    shifters: Vec<PitchShifter>,
    reverb: StereoReverb,
    freeze: FreezeLoop,
    pending: Option<Event>,

    mix: SmoothedParam,
    feedback: SmoothedParam,
    reverb_send: SmoothedParam,
    time: f32,
    dispersal: f32,
    sensors: f32,
    depth: f32,

    delay_mode: DelayMode,
    feedback_mode: FeedbackMode,
    chroma_type: ChromaType,

    active: [bool; LINES],
    side_gain: [f32; 2],
}

impl Nautilus {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let capacity = config
            .samples_for(config.nautilus_seconds)
            .max(MIN_DELAY as usize + 2);
        let lines = (0..LINES)
            .map(|_| DelayLine::try_new(capacity, config.sample_rate))
            .collect::<Result<Vec<_>, _>>()?;
        let shifters = (0..LINES)
            .map(|_| PitchShifter::new(config.sample_rate, SHIMMER_SEMITONES))
            .collect();
        info!(
            lines = LINES,
            capacity,
            seconds = config.nautilus_seconds,
            "nautilus lines allocated"
        );

        let mut engine = Self {
            sample_rate: config.sample_rate,
            lines,
            chroma: [Chroma::new(); LINES],
            shifters,
            reverb: StereoReverb::new(config.sample_rate),
            freeze: FreezeLoop {
                left: vec![0.0; capacity],
                right: vec![0.0; capacity],
                len: 0,
                pos: 0,
                active: false,
            },
            pending: None,
            mix: SmoothedParam::new(Param::Mix.default_value(), PARAM_SMOOTHING),
            feedback: SmoothedParam::new(Param::Feedback.default_value(), PARAM_SMOOTHING),
            reverb_send: SmoothedParam::new(Param::Reverb.default_value(), PARAM_SMOOTHING),
            time: Param::Time.default_value(),
            dispersal: Param::Dispersal.default_value(),
            sensors: Param::Sensors.default_value(),
            depth: Param::Depth.default_value(),
            delay_mode: DelayMode::default(),
            feedback_mode: FeedbackMode::default(),
            chroma_type: ChromaType::default(),
            active: [true; LINES],
            side_gain: [1.0; 2],
        };
        engine.update_sensors();
        engine.update_delays();
        for line in &mut engine.lines {
            line.settle();
        }
        engine.update_chroma();
        Ok(engine)
    }

    /// Base delay in samples for the current `time`.
    pub fn base_delay(&self) -> f64 {
        let capacity = self.lines[0].capacity() as f64;
        MIN_DELAY * (capacity / MIN_DELAY).powf(self.time as f64)
    }

    pub fn line_delay(&self, j: usize) -> f64 {
        self.lines[j].delay()
    }

    pub fn line_target(&self, j: usize) -> f64 {
        self.lines[j].target()
    }

    /// The coefficient actually applied on the feedback paths.
    pub fn feedback_coefficient(&self) -> f32 {
        self.feedback.current().min(MAX_FEEDBACK)
    }

    pub fn active_lines(&self) -> usize {
        self.active.iter().filter(|a| **a).count()
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze.active
    }

    fn update_delays(&mut self) {
        let base = self.base_delay();
        let transition = self.delay_mode.transition();
        for (j, line) in self.lines.iter_mut().enumerate() {
            let k = (j % LINES_PER_SIDE) as f64;
            line.set_target(base * (1.0 + self.dispersal as f64 * k), transition);
        }
    }

    fn update_sensors(&mut self) {
        let count = 1 + (self.sensors * (LINES - 1) as f32).round() as usize;
        self.active = [false; LINES];
        for &j in &ACTIVATION_ORDER[..count] {
            self.active[j] = true;
        }
        for side in 0..2 {
            let n = self.active[side * LINES_PER_SIDE..(side + 1) * LINES_PER_SIDE]
                .iter()
                .filter(|a| **a)
                .count();
            self.side_gain[side] = if n > 0 { 1.0 / (n as f32).sqrt() } else { 0.0 };
        }
    }

    fn update_chroma(&mut self) {
        for chroma in &mut self.chroma {
            chroma.configure(self.chroma_type, self.depth, self.sample_rate);
        }
    }

    fn set_delay_mode(&mut self, mode: DelayMode) {
        self.delay_mode = mode;
        let semitones = match mode {
            DelayMode::Deshimmer => -SHIMMER_SEMITONES,
            _ => SHIMMER_SEMITONES,
        };
        for shifter in &mut self.shifters {
            shifter.set_semitones(semitones);
        }
        if mode.transition() == Transition::Snap {
            for line in &mut self.lines {
                line.settle();
            }
        }
    }

    fn set_freeze(&mut self, on: bool) {
        if on == self.freeze.active {
            return;
        }
        if on {
            let len = (self.lines[0].delay().round() as usize).min(self.freeze.left.len());
            self.lines[0].snapshot(len, &mut self.freeze.left);
            self.lines[LINES_PER_SIDE].snapshot(len, &mut self.freeze.right);
            self.freeze.len = len;
            self.freeze.pos = 0;
            self.pending = Some(Event::FreezeComplete { length: len });
        }
        self.freeze.active = on;
    }

    fn purge(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        for chroma in &mut self.chroma {
            chroma.reset();
        }
        for shifter in &mut self.shifters {
            shifter.reset();
        }
        self.reverb.reset();
        self.freeze.active = false;
        self.freeze.len = 0;
        self.freeze.left.fill(0.0);
        self.freeze.right.fill(0.0);
    }

    fn set_param(&mut self, param: Param, value: f32) {
        let Some(value) = param.clamp(value) else {
            return;
        };
        match param {
            Param::Mix => self.mix.set_target(value),
            Param::Feedback => self.feedback.set_target(value),
            Param::Reverb => self.reverb_send.set_target(value),
            Param::Time => {
                self.time = value;
                self.update_delays();
            }
            Param::Dispersal => {
                self.dispersal = value;
                self.update_delays();
            }
            Param::Sensors => {
                self.sensors = value;
                self.update_sensors();
            }
            Param::Depth => {
                self.depth = value;
                self.update_chroma();
            }
        }
    }
}

impl Engine for Nautilus {
    type Command = NautilusCommand;

    fn kind(&self) -> EngineKind {
        EngineKind::Nautilus
    }

    fn apply(&mut self, command: NautilusCommand) {
        match command {
            NautilusCommand::Set(param, value) => self.set_param(param, value),
            NautilusCommand::DelayMode(mode) => self.set_delay_mode(mode),
            NautilusCommand::FeedbackMode(mode) => self.feedback_mode = mode,
            NautilusCommand::ChromaType(kind) => {
                self.chroma_type = kind;
                self.update_chroma();
            }
            NautilusCommand::ReverbPreset(preset) => self.reverb.set_preset(preset),
            NautilusCommand::Transport(transport) => match transport {
                Transport::Freeze(on) => self.set_freeze(on),
                Transport::Purge => self.purge(),
                Transport::Reset => {
                    for line in &mut self.lines {
                        line.settle();
                    }
                    self.freeze.pos = 0;
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
        if let Some(event) = self.pending.take() {
            events.emit(event);
        }

        let transition = self.delay_mode.transition();
        let shimmer = matches!(self.delay_mode, DelayMode::Shimmer | DelayMode::Deshimmer);

        for i in 0..output.frames() {
            let (in_l, in_r) = input.frame(i);
            let feedback = self.feedback.next().min(MAX_FEEDBACK);

            let mut taps = [0.0f32; LINES];
            for (tap, line) in taps.iter_mut().zip(self.lines.iter_mut()) {
                *tap = line.read(transition);
            }

            for j in 0..LINES {
                let mut fb = self.chroma[j].process(taps[self.feedback_mode.source(j)]);
                if shimmer {
                    fb = self.shifters[j].process(fb);
                }
                let dry = if j < LINES_PER_SIDE { in_l } else { in_r };
                let inject = if self.active[j] && self.feedback_mode.takes_input(j) {
                    dry
                } else {
                    0.0
                };
                self.lines[j].write(inject + fb * feedback);
            }

            let (mut wet_l, mut wet_r) = if self.freeze.active && self.freeze.len > 0 {
                let frame = (
                    self.freeze.left[self.freeze.pos],
                    self.freeze.right[self.freeze.pos],
                );
                self.freeze.pos = (self.freeze.pos + 1) % self.freeze.len;
                frame
            } else {
                let mut sum = [0.0f32; 2];
                for (j, tap) in taps.iter().enumerate() {
                    if self.active[j] {
                        sum[j / LINES_PER_SIDE] += tap;
                    }
                }
                (sum[0] * self.side_gain[0], sum[1] * self.side_gain[1])
            };

            let send = self.reverb_send.next();
            let (rev_l, rev_r) = self.reverb.process(wet_l * send, wet_r * send);
            wet_l += rev_l;
            wet_r += rev_r;

            let mix = self.mix.next();
            output.write(
                i,
                in_l * (1.0 - mix) + wet_l * mix,
                in_r * (1.0 - mix) + wet_r * mix,
            );
        }
    }

    fn params(&self) -> ParamMap {
        Param::ALL
            .iter()
            .map(|&p| {
                let value = match p {
                    Param::Mix => self.mix.target(),
                    Param::Time => self.time,
                    Param::Feedback => self.feedback.target(),
                    Param::Dispersal => self.dispersal,
                    Param::Sensors => self.sensors,
                    Param::Depth => self.depth,
                    Param::Reverb => self.reverb_send.target(),
                };
                (p.name().to_string(), value)
            })
            .collect()
    }

    fn modes(&self) -> ModeMap {
        [
            (DelayMode::FIELD, self.delay_mode.name()),
            (FeedbackMode::FIELD, self.feedback_mode.name()),
            (ChromaType::FIELD, self.chroma_type.name()),
            (ReverbPreset::FIELD, self.reverb.preset().name()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn param_command(&self, name: &str, value: f32) -> Option<NautilusCommand> {
        NautilusCommand::from_param(name, value)
    }

    fn mode_command(&self, field: &str, value: &str) -> Option<NautilusCommand> {
        NautilusCommand::from_mode(field, value)
    }

    fn default_commands(&self) -> Vec<NautilusCommand> {
        NautilusCommand::defaults()
    }

    fn reset(&mut self) {
        self.apply(NautilusCommand::Transport(Transport::Reset));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Discard;

    fn config() -> EngineConfig {
        EngineConfig::default()
            .with_sample_rate(8_000.0)
            .with_buffer_seconds(1.0)
    }

    fn run(engine: &mut Nautilus, input: &[f32], events: &mut Vec<Event>) -> (Vec<f32>, Vec<f32>) {
        let mut l = vec![0.0; input.len()];
        let mut r = vec![0.0; input.len()];
        engine.process(
            &AudioInput::mono(input),
            &mut AudioOutput::new(&mut l, &mut r),
            events,
        );
        (l, r)
    }

    #[test]
    fn test_silence_in_silence_out() {
        let mut engine = Nautilus::new(&config()).unwrap();
        let mut l = vec![1.0; 2048];
        let mut r = vec![1.0; 2048];
        engine.process(
            &AudioInput::silent(),
            &mut AudioOutput::new(&mut l, &mut r),
            &mut Discard,
        );
        assert!(l.iter().chain(r.iter()).all(|&s| s == 0.0));
    }

    #[test]
    fn test_routing_tables() {
        assert_eq!(FeedbackMode::Normal.source(5), 5);
        assert_eq!(FeedbackMode::PingPong.source(1), 5);
        assert_eq!(FeedbackMode::PingPong.source(6), 2);
        assert_eq!(FeedbackMode::Cascade.source(0), 3);
        assert_eq!(FeedbackMode::Cascade.source(5), 4);
        assert_eq!(FeedbackMode::Adrift.source(4), 0);
        assert_eq!(FeedbackMode::Adrift.source(0), 7);
        assert!(FeedbackMode::Cascade.takes_input(4));
        assert!(!FeedbackMode::Adrift.takes_input(1));

        // every routing is a permutation
        for mode in FeedbackMode::ALL {
            let mut seen = [false; LINES];
            for j in 0..LINES {
                seen[mode.source(j)] = true;
            }
            assert!(seen.iter().all(|s| *s), "{mode:?}");
        }
    }

    #[test]
    fn test_time_maps_to_delay() {
        let mut engine = Nautilus::new(&config()).unwrap();
        engine.apply(NautilusCommand::Set(Param::Time, 0.0));
        assert_eq!(engine.line_target(0), MIN_DELAY);
        engine.apply(NautilusCommand::Set(Param::Time, 1.0));
        assert_eq!(engine.line_target(0), 7_999.0);
    }

    #[test]
    fn test_dispersal_spreads_lines() {
        let mut engine = Nautilus::new(&config()).unwrap();
        engine.apply(NautilusCommand::Set(Param::Time, 0.2));
        engine.apply(NautilusCommand::Set(Param::Dispersal, 0.5));
        let base = engine.line_target(0);
        assert!((engine.line_target(2) - base * 2.0).abs() < 1e-9);
        assert!((engine.line_target(6) - base * 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_sensors_activate_alternately() {
        let mut engine = Nautilus::new(&config()).unwrap();
        engine.apply(NautilusCommand::Set(Param::Sensors, 0.0));
        assert_eq!(engine.active_lines(), 1);
        assert!(engine.active[0]);
        engine.apply(NautilusCommand::Set(Param::Sensors, 3.0 / 7.0));
        assert_eq!(engine.active_lines(), 4);
        assert_eq!(engine.active, [true, true, false, false, true, true, false, false]);
    }

    #[test]
    fn test_echo_arrives_after_delay() {
        let mut engine = Nautilus::new(&config()).unwrap();
        engine.apply(NautilusCommand::Set(Param::Time, 0.0));
        engine.apply(NautilusCommand::Set(Param::Sensors, 0.0));
        engine.apply(NautilusCommand::Set(Param::Mix, 1.0));
        engine.mix.snap();
        for line in &mut engine.lines {
            line.settle();
        }

        let mut input = vec![0.0; 400];
        input[0] = 1.0;
        let (l, _) = run(&mut engine, &input, &mut Vec::new());
        let peak = l
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(128));
    }

    #[test]
    fn test_feedback_never_reaches_one() {
        let mut engine = Nautilus::new(&config()).unwrap();
        engine.apply(NautilusCommand::Set(Param::Feedback, 1.0));
        run(&mut engine, &[0.0; 20_000], &mut Vec::new());
        assert_eq!(engine.feedback_coefficient(), MAX_FEEDBACK);
    }

    #[test]
    fn test_freeze_loops_snapshot() {
        let mut engine = Nautilus::new(&config()).unwrap();
        engine.apply(NautilusCommand::Set(Param::Time, 0.0));
        engine.apply(NautilusCommand::Set(Param::Feedback, 0.0));
        engine.apply(NautilusCommand::Set(Param::Mix, 1.0));
        engine.mix.snap();
        let input: Vec<f32> = (0..1_000).map(|i| (i as f32 * 0.1).sin()).collect();
        run(&mut engine, &input, &mut Vec::new());

        engine.apply(NautilusCommand::Transport(Transport::Freeze(true)));
        let mut events = Vec::new();
        let (first, _) = run(&mut engine, &[0.0; 128], &mut events);
        let (second, _) = run(&mut engine, &[0.0; 128], &mut events);
        assert_eq!(events, vec![Event::FreezeComplete { length: 128 }]);
        assert!(first.iter().any(|&s| s.abs() > 0.1));
        assert_eq!(first, second);
    }

    #[test]
    fn test_shimmer_and_chroma_stay_finite() {
        let mut engine = Nautilus::new(&config()).unwrap();
        engine.apply(NautilusCommand::Set(Param::Feedback, 0.8));
        engine.apply(NautilusCommand::Set(Param::Depth, 0.7));
        engine.apply(NautilusCommand::Set(Param::Reverb, 0.8));
        let input: Vec<f32> = (0..8_000).map(|i| (i as f32 * 0.03).sin()).collect();
        for mode in DelayMode::ALL {
            engine.apply(NautilusCommand::DelayMode(*mode));
            for chroma in ChromaType::ALL {
                engine.apply(NautilusCommand::ChromaType(*chroma));
                let (l, r) = run(&mut engine, &input[..1_000], &mut Vec::new());
                assert!(l.iter().chain(r.iter()).all(|s| s.is_finite() && s.abs() < 100.0));
            }
        }
    }

    #[test]
    fn test_modes_report_names() {
        let mut engine = Nautilus::new(&config()).unwrap();
        engine.apply(NautilusCommand::FeedbackMode(FeedbackMode::PingPong));
        engine.apply(NautilusCommand::ReverbPreset(ReverbPreset::Dark));
        let modes = engine.modes();
        assert_eq!(modes["feedback_mode"], "ping_pong");
        assert_eq!(modes["reverb_preset"], "dark");
    }
}
