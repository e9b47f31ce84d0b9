//! UI-side mirror of the engine's knobs and switches
//!
//! The engine lives on the audio thread, so the UI keeps its own copy of
//! every value it has sent and turns key presses into commands.

use std::collections::VecDeque;

use tapeworks::{
    control::{Deck, Event, Levels, ModeMap, ParamMap, ParamResolver, RecordSource, Transport},
    engine::{EngineKind, LubadhCommand, MorphageneCommand, UnitCommand},
};

/// Lines kept in the event log
const LOG_LINES: usize = 6;

/// Messages for the audio thread that are not engine commands
#[derive(Clone, Copy, Debug)]
pub enum ClockMessage {
    SetBpm(f32),
    Toggle,
}

/// One continuous parameter as shown in the panel
#[derive(Clone, Debug)]
pub struct ParamRow {
    pub name: &'static str,
    pub value: f32,
    pub min: f32,
    pub max: f32,
}

impl ParamRow {
    /// Position inside the range, 0.0-1.0
    pub fn normalized(&self) -> f32 {
        if self.max > self.min {
            (self.value - self.min) / (self.max - self.min)
        } else {
            0.0
        }
    }
}

/// One mode field with its possible values
#[derive(Clone, Debug)]
pub struct ModeRow {
    pub field: &'static str,
    pub options: Vec<&'static str>,
    pub current: usize,
}

impl ModeRow {
    pub fn value(&self) -> &'static str {
        self.options.get(self.current).copied().unwrap_or("?")
    }
}

/// Everything the UI draws
pub struct UiState {
    pub kind: EngineKind,
    resolver: ParamResolver,
    pub sample_rate: f32,
    pub bpm: f32,
    pub clock_running: bool,
    pub params: Vec<ParamRow>,
    pub modes: Vec<ModeRow>,
    pub selected_param: usize,
    pub selected_mode: usize,
    pub frozen: bool,
    pub recording: bool,
    pub levels: Levels,
    /// Loop ends, gene ends and clock divisions seen so far
    pub ticks: u64,
    pub log: VecDeque<String>,
}

impl UiState {
    pub fn new(
        kind: EngineKind,
        sample_rate: f32,
        bpm: f32,
        params: &ParamMap,
        modes: &ModeMap,
    ) -> Self {
        let params = kind
            .param_specs()
            .into_iter()
            .map(|(name, default, min, max)| ParamRow {
                name,
                value: params.get(name).copied().unwrap_or(default),
                min,
                max,
            })
            .collect();
        let modes = kind
            .mode_options()
            .into_iter()
            .map(|(field, options)| {
                let current = modes
                    .get(field)
                    .and_then(|v| options.iter().position(|o| *o == v.as_str()))
                    .unwrap_or(0);
                ModeRow {
                    field,
                    options,
                    current,
                }
            })
            .collect();

        Self {
            kind,
            resolver: ParamResolver::new(kind),
            sample_rate,
            bpm,
            clock_running: false,
            params,
            modes,
            selected_param: 0,
            selected_mode: 0,
            frozen: false,
            recording: false,
            levels: Levels::default(),
            ticks: 0,
            log: VecDeque::with_capacity(LOG_LINES),
        }
    }

    pub fn select_param(&mut self, delta: isize) {
        let n = self.params.len().max(1) as isize;
        self.selected_param = (self.selected_param as isize + delta).rem_euclid(n) as usize;
    }

    pub fn select_mode(&mut self) {
        self.selected_mode = (self.selected_mode + 1) % self.modes.len().max(1);
    }

    /// Move the selected knob by `percent` of its range
    pub fn nudge(&mut self, percent: f32) -> Option<UnitCommand> {
        let row = self.params.get_mut(self.selected_param)?;
        let step = (row.max - row.min) * percent / 100.0;
        row.value = (row.value + step).clamp(row.min, row.max);
        self.resolver.param(row.name, row.value)
    }

    /// Step the selected mode field to its next value
    pub fn cycle_mode(&mut self) -> Option<UnitCommand> {
        let row = self.modes.get_mut(self.selected_mode)?;
        row.current = (row.current + 1) % row.options.len().max(1);
        self.resolver.mode(row.field, row.value())
    }

    pub fn toggle_freeze(&mut self) -> UnitCommand {
        self.frozen = !self.frozen;
        UnitCommand::Transport(Transport::Freeze(self.frozen))
    }

    /// Start or stop recording on engines that record on demand
    pub fn toggle_record(&mut self) -> Option<UnitCommand> {
        let on = !self.recording;
        let command = match self.kind {
            EngineKind::Morphagene => UnitCommand::Morphagene(MorphageneCommand::Record(on)),
            EngineKind::Lubadh => UnitCommand::Lubadh(LubadhCommand::Record(Deck::A, on)),
            _ => return None,
        };
        self.recording = on;
        Some(command)
    }

    pub fn trigger(&self) -> Option<UnitCommand> {
        match self.kind {
            EngineKind::Morphagene => Some(UnitCommand::Morphagene(MorphageneCommand::Trigger)),
            EngineKind::Lubadh => Some(UnitCommand::Lubadh(LubadhCommand::Retrigger(Deck::A))),
            _ => None,
        }
    }

    pub fn change_bpm(&mut self, delta: f32) -> ClockMessage {
        self.bpm = (self.bpm + delta).clamp(20.0, 300.0);
        ClockMessage::SetBpm(self.bpm)
    }

    /// Fold one event from the audio thread into the display
    pub fn observe(&mut self, event: Event) {
        match event {
            Event::Meter(levels) => self.levels = levels,
            Event::LoopEnd { .. } | Event::EndOfGene | Event::ClockDivision => {
                self.ticks = self.ticks.wrapping_add(1);
            }
            Event::RecordingStopped { source, length } => {
                self.recording = false;
                let what = match source {
                    RecordSource::Reel { splice } => format!("reel, splice {splice}"),
                    RecordSource::Deck(deck) => format!("deck {}", deck.name()),
                };
                self.push_log(format!(
                    "recording stopped ({what}): {:.2} s",
                    length as f32 / self.sample_rate
                ));
            }
            Event::FreezeComplete { length } => {
                self.push_log(format!("frozen {length} samples"));
            }
        }
    }

    pub fn push_log(&mut self, line: String) {
        if self.log.len() == LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }
}
