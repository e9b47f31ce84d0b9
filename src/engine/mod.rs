//! The four effect engines and the plumbing that drives them.
//!
//! Each engine is a plain struct that owns every buffer and filter it uses.
//! Nothing is shared between instances, so two delays side by side are fully
//! independent. Engines are driven through the [`Engine`] trait; hosts that
//! pick the engine at runtime use the closed [`EffectUnit`] variant instead
//! of trait objects.

pub mod databender;
pub mod host;
pub mod lubadh;
pub mod morphagene;
pub mod nautilus;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    config::EngineConfig,
    control::{params::flag_name, EventSink, ModeMap, ParamMap, Transport},
    error::EngineError,
    io::{AudioInput, AudioOutput},
    preset::Preset,
};

pub use databender::{Databender, DatabenderCommand};
pub use host::EngineHost;
pub use lubadh::{Lubadh, LubadhCommand};
pub use morphagene::{Morphagene, MorphageneCommand};
pub use nautilus::{Nautilus, NautilusCommand};

/// A processing engine driven by typed commands.
///
/// `apply` and `process` run on the audio thread and never block, allocate
/// or fail. Everything else is control-side.
pub trait Engine {
    type Command: Copy + Send + 'static;

    fn kind(&self) -> EngineKind;

    /// Apply one command. Takes effect from the next processed sample.
    fn apply(&mut self, command: Self::Command);

    /// Render one block. `output.frames()` decides the block length; missing
    /// or short inputs read as silence.
    fn process<S: EventSink>(
        &mut self,
        input: &AudioInput<'_>,
        output: &mut AudioOutput<'_>,
        events: &mut S,
    );

    /// Parameter targets (not smoothed values).
    fn params(&self) -> ParamMap;

    fn modes(&self) -> ModeMap;

    fn param_command(&self, name: &str, value: f32) -> Option<Self::Command>;

    fn mode_command(&self, field: &str, value: &str) -> Option<Self::Command>;

    /// Commands that put every parameter and mode back to its default.
    fn default_commands(&self) -> Vec<Self::Command>;

    /// Restart playback state, keeping recorded audio.
    fn reset(&mut self);

    fn preset(&self) -> Preset {
        Preset {
            engine: self.kind(),
            params: self.params(),
            modes: self.modes(),
        }
    }

    /// Defaults first, then the stored values, so loading is idempotent and
    /// missing fields fall back to defaults.
    fn preset_commands(&self, preset: &Preset) -> Result<Vec<Self::Command>, EngineError> {
        if preset.engine != self.kind() {
            return Err(EngineError::EngineMismatch {
                expected: self.kind(),
                found: preset.engine,
            });
        }

        let mut commands = self.default_commands();
        for (name, value) in &preset.params {
            match self.param_command(name, *value) {
                Some(command) => commands.push(command),
                None => warn!(engine = self.kind().name(), %name, "preset parameter ignored"),
            }
        }
        for (field, value) in &preset.modes {
            match self.mode_command(field, value) {
                Some(command) => commands.push(command),
                None => warn!(engine = self.kind().name(), %field, %value, "preset mode ignored"),
            }
        }
        Ok(commands)
    }

    /// Load directly into a local engine (outside the audio thread).
    fn load_preset(&mut self, preset: &Preset) -> Result<(), EngineError> {
        let commands = self.preset_commands(preset)?;
        debug!(
            engine = self.kind().name(),
            commands = commands.len(),
            "loading preset"
        );
        for command in commands {
            self.apply(command);
        }
        Ok(())
    }
}

/// Which emulation an engine, preset or command belongs to.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Databender,
    Morphagene,
    Nautilus,
    Lubadh,
}

impl EngineKind {
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Databender,
        EngineKind::Morphagene,
        EngineKind::Nautilus,
        EngineKind::Lubadh,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EngineKind::Databender => "databender",
            EngineKind::Morphagene => "morphagene",
            EngineKind::Nautilus => "nautilus",
            EngineKind::Lubadh => "lubadh",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn param_command(self, name: &str, value: f32) -> Option<UnitCommand> {
        match self {
            EngineKind::Databender => {
                DatabenderCommand::from_param(name, value).map(UnitCommand::Databender)
            }
            EngineKind::Morphagene => {
                MorphageneCommand::from_param(name, value).map(UnitCommand::Morphagene)
            }
            EngineKind::Nautilus => {
                NautilusCommand::from_param(name, value).map(UnitCommand::Nautilus)
            }
            EngineKind::Lubadh => LubadhCommand::from_param(name, value).map(UnitCommand::Lubadh),
        }
    }

    pub fn mode_command(self, field: &str, value: &str) -> Option<UnitCommand> {
        match self {
            EngineKind::Databender => {
                DatabenderCommand::from_mode(field, value).map(UnitCommand::Databender)
            }
            EngineKind::Morphagene => {
                MorphageneCommand::from_mode(field, value).map(UnitCommand::Morphagene)
            }
            EngineKind::Nautilus => {
                NautilusCommand::from_mode(field, value).map(UnitCommand::Nautilus)
            }
            EngineKind::Lubadh => LubadhCommand::from_mode(field, value).map(UnitCommand::Lubadh),
        }
    }

    pub fn default_commands(self) -> Vec<UnitCommand> {
        match self {
            EngineKind::Databender => DatabenderCommand::defaults()
                .into_iter()
                .map(UnitCommand::Databender)
                .collect(),
            EngineKind::Morphagene => MorphageneCommand::defaults()
                .into_iter()
                .map(UnitCommand::Morphagene)
                .collect(),
            EngineKind::Nautilus => NautilusCommand::defaults()
                .into_iter()
                .map(UnitCommand::Nautilus)
                .collect(),
            EngineKind::Lubadh => LubadhCommand::defaults()
                .into_iter()
                .map(UnitCommand::Lubadh)
                .collect(),
        }
    }

    /// `(name, default, min, max)` for every continuous parameter.
    pub fn param_specs(self) -> Vec<(&'static str, f32, f32, f32)> {
        fn collect<P: Copy>(
            all: &[P],
            name: fn(P) -> &'static str,
            default: fn(P) -> f32,
            range: fn(P) -> (f32, f32),
        ) -> Vec<(&'static str, f32, f32, f32)> {
            all.iter()
                .map(|&p| {
                    let (min, max) = range(p);
                    (name(p), default(p), min, max)
                })
                .collect()
        }
        match self {
            EngineKind::Databender => {
                use databender::Param;
                collect(Param::ALL, Param::name, Param::default_value, Param::range)
            }
            EngineKind::Morphagene => {
                use morphagene::Param;
                collect(Param::ALL, Param::name, Param::default_value, Param::range)
            }
            EngineKind::Nautilus => {
                use nautilus::Param;
                collect(Param::ALL, Param::name, Param::default_value, Param::range)
            }
            EngineKind::Lubadh => {
                use lubadh::Param;
                collect(Param::ALL, Param::name, Param::default_value, Param::range)
            }
        }
    }

    /// Every mode field with its possible values, in cycling order.
    pub fn mode_options(self) -> Vec<(&'static str, Vec<&'static str>)> {
        fn names<M: Copy>(all: &[M], name: fn(M) -> &'static str) -> Vec<&'static str> {
            all.iter().map(|&m| name(m)).collect()
        }
        let flag = || vec![flag_name(false), flag_name(true)];
        match self {
            EngineKind::Databender => {
                use databender::{ClockMode, CorruptType, OperationMode, REVERSE_FIELD};
                vec![
                    (OperationMode::FIELD, names(OperationMode::ALL, OperationMode::name)),
                    (ClockMode::FIELD, names(ClockMode::ALL, ClockMode::name)),
                    (CorruptType::FIELD, names(CorruptType::ALL, CorruptType::name)),
                    (REVERSE_FIELD, flag()),
                ]
            }
            EngineKind::Morphagene => {
                use morphagene::{RecordMode, TriggerMode};
                vec![
                    (RecordMode::FIELD, names(RecordMode::ALL, RecordMode::name)),
                    (TriggerMode::FIELD, names(TriggerMode::ALL, TriggerMode::name)),
                ]
            }
            EngineKind::Nautilus => {
                use crate::dsp::reverb::ReverbPreset;
                use nautilus::{ChromaType, DelayMode, FeedbackMode};
                vec![
                    (DelayMode::FIELD, names(DelayMode::ALL, DelayMode::name)),
                    (FeedbackMode::FIELD, names(FeedbackMode::ALL, FeedbackMode::name)),
                    (ChromaType::FIELD, names(ChromaType::ALL, ChromaType::name)),
                    (ReverbPreset::FIELD, names(ReverbPreset::ALL, ReverbPreset::name)),
                ]
            }
            EngineKind::Lubadh => {
                use lubadh::{RecordMode, LINK_FIELD, ONE_SHOT_FIELD};
                vec![
                    (RecordMode::FIELD, names(RecordMode::ALL, RecordMode::name)),
                    (LINK_FIELD, flag()),
                    (ONE_SHOT_FIELD, flag()),
                ]
            }
        }
    }
}

/// A command for whichever engine a slot holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitCommand {
    Databender(DatabenderCommand),
    Morphagene(MorphageneCommand),
    Nautilus(NautilusCommand),
    Lubadh(LubadhCommand),
    /// Routed to whatever engine is present.
    Transport(Transport),
}

/// Closed set of engines for hosts that choose at runtime.
#[derive(Debug)]
pub enum EffectUnit {
    Databender(Box<Databender>),
    Morphagene(Box<Morphagene>),
    Nautilus(Box<Nautilus>),
    Lubadh(Box<Lubadh>),
}

impl EffectUnit {
    pub fn new(kind: EngineKind, config: &EngineConfig) -> Result<Self, EngineError> {
        Ok(match kind {
            EngineKind::Databender => EffectUnit::Databender(Box::new(Databender::new(config)?)),
            EngineKind::Morphagene => EffectUnit::Morphagene(Box::new(Morphagene::new(config)?)),
            EngineKind::Nautilus => EffectUnit::Nautilus(Box::new(Nautilus::new(config)?)),
            EngineKind::Lubadh => EffectUnit::Lubadh(Box::new(Lubadh::new(config)?)),
        })
    }
}

macro_rules! dispatch {
    ($unit:expr, $engine:ident => $body:expr) => {
        match $unit {
            EffectUnit::Databender($engine) => $body,
            EffectUnit::Morphagene($engine) => $body,
            EffectUnit::Nautilus($engine) => $body,
            EffectUnit::Lubadh($engine) => $body,
        }
    };
}

impl Engine for EffectUnit {
    type Command = UnitCommand;

    fn kind(&self) -> EngineKind {
        dispatch!(self, engine => engine.kind())
    }

    fn apply(&mut self, command: UnitCommand) {
        match (self, command) {
            (EffectUnit::Databender(e), UnitCommand::Databender(c)) => e.apply(c),
            (EffectUnit::Morphagene(e), UnitCommand::Morphagene(c)) => e.apply(c),
            (EffectUnit::Nautilus(e), UnitCommand::Nautilus(c)) => e.apply(c),
            (EffectUnit::Lubadh(e), UnitCommand::Lubadh(c)) => e.apply(c),
            (EffectUnit::Databender(e), UnitCommand::Transport(t)) => {
                e.apply(DatabenderCommand::Transport(t))
            }
            (EffectUnit::Morphagene(e), UnitCommand::Transport(t)) => {
                e.apply(MorphageneCommand::Transport(t))
            }
            (EffectUnit::Nautilus(e), UnitCommand::Transport(t)) => {
                e.apply(NautilusCommand::Transport(t))
            }
            (EffectUnit::Lubadh(e), UnitCommand::Transport(t)) => {
                e.apply(LubadhCommand::Transport(t))
            }
            // addressed to another engine kind
            _ => {}
        }
    }

    fn process<S: EventSink>(
        &mut self,
        input: &AudioInput<'_>,
        output: &mut AudioOutput<'_>,
        events: &mut S,
    ) {
        dispatch!(self, engine => engine.process(input, output, events))
    }

    fn params(&self) -> ParamMap {
        dispatch!(self, engine => engine.params())
    }

    fn modes(&self) -> ModeMap {
        dispatch!(self, engine => engine.modes())
    }

    fn param_command(&self, name: &str, value: f32) -> Option<UnitCommand> {
        self.kind().param_command(name, value)
    }

    fn mode_command(&self, field: &str, value: &str) -> Option<UnitCommand> {
        self.kind().mode_command(field, value)
    }

    fn default_commands(&self) -> Vec<UnitCommand> {
        self.kind().default_commands()
    }

    fn reset(&mut self) {
        dispatch!(self, engine => engine.reset())
    }
}

/// Lifecycle of one engine instance as seen by the control plane.
///
/// A failed engine stays failed and renders silence; it never takes the
/// rest of the host down with it.
#[derive(Debug, Default)]
pub enum EngineSlot {
    #[default]
    Uninitialized,
    Ready(EffectUnit),
    Failed(EngineError),
}

impl EngineSlot {
    /// Build the engine, replacing whatever the slot held.
    pub fn initialize(&mut self, kind: EngineKind, config: &EngineConfig) -> Option<&mut EffectUnit> {
        let built = config
            .validate()
            .and_then(|_| EffectUnit::new(kind, config));
        *self = match built {
            Ok(unit) => {
                info!(engine = kind.name(), sample_rate = config.sample_rate, "engine ready");
                EngineSlot::Ready(unit)
            }
            Err(err) => {
                error!(engine = kind.name(), %err, "engine unavailable");
                EngineSlot::Failed(err)
            }
        };
        self.unit_mut()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EngineSlot::Ready(_))
    }

    pub fn unit(&self) -> Option<&EffectUnit> {
        match self {
            EngineSlot::Ready(unit) => Some(unit),
            _ => None,
        }
    }

    pub fn unit_mut(&mut self) -> Option<&mut EffectUnit> {
        match self {
            EngineSlot::Ready(unit) => Some(unit),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&EngineError> {
        match self {
            EngineSlot::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Move the engine out (to hand it to the audio thread).
    pub fn take(&mut self) -> Option<EffectUnit> {
        match std::mem::take(self) {
            EngineSlot::Ready(unit) => Some(unit),
            other => {
                *self = other;
                None
            }
        }
    }

    pub fn apply(&mut self, command: UnitCommand) {
        if let Some(unit) = self.unit_mut() {
            unit.apply(command);
        }
    }

    /// Render through the engine, or silence if there is none.
    pub fn process<S: EventSink>(
        &mut self,
        input: &AudioInput<'_>,
        output: &mut AudioOutput<'_>,
        events: &mut S,
    ) {
        match self.unit_mut() {
            Some(unit) => unit.process(input, output, events),
            None => output.silence(),
        }
    }
}
