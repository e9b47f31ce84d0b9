//! Granular looper: a long reel cut into splices, replayed as grains.

/*
Morphagene
==========

Audio is recorded onto a reel and divided into splices (see `splice`).
Playback never runs straight through the reel: it plays grains, short
enveloped reads taken from the current splice.

Vocabulary
----------

  gene        the slice of the splice one grain covers. `gene_size` 0 is
              the whole splice; 1 shrinks it to 1 ms along a log curve.

  slide       offsets where in the splice the gene starts.

  morph       how grains are laid out in time:

                 0 ──── .2 ──── .35 ──── .55 ──── .75 ──── 1
                 gapped │ seamless│ 2 voices│ 3 voices│ 4 voices
                 single │ single  │         │ panned  │ panned, chord

              In the gapped band the silence between grains shrinks from
              one whole gene (morph 0) to none (morph 0.2).

  organize    picks the splice played next, applied when the next grain
              starts.

  s.o.s.      sound on sound: the balance between live input and the
              reel, and the feedback amount when overdubbing.

Spawning
--------

In free mode a counter runs against the spawn interval: one gene plus its
gap for a single voice, a gene divided by the voice count when grains
overlap. In synced mode grains only start on clock pulses.

Every clock pulse also moves the gene. Below morph 0.37 it steps one gene
forward from where it is (gene shift); from 0.37 it counts genes from the
splice start (time stretch). Both wrap inside the splice.
*/

pub mod grain;
pub mod splice;

use tracing::info;

use crate::{
    config::EngineConfig,
    control::{
        params::{mode_enum, param_enum},
        Event, EventSink, ModeMap, ParamMap, RecordSource, Transport,
    },
    dsp::{CircularBuffer, SmoothedParam, VarispeedCurve},
    engine::{Engine, EngineKind},
    error::EngineError,
    io::{AudioInput, AudioOutput},
};

use grain::GrainVoice;
pub use splice::{Placed, SpliceSet, MAX_SPLICES};

param_enum! {
    pub enum Param {
        Varispeed => "varispeed", 0.75, 0.0..=1.0;
        GeneSize => "gene_size", 0.0, 0.0..=1.0;
        Slide => "slide", 0.0, 0.0..=1.0;
        Morph => "morph", 0.3, 0.0..=1.0;
        Organize => "organize", 0.0, 0.0..=1.0;
        Sos => "sos", 1.0, 0.0..=1.0;
    }
}

mode_enum! {
    pub enum RecordMode ("record_mode") {
        NewSplice => "new_splice",
        TimeLag => "time_lag",
    }
    default NewSplice
}

mode_enum! {
    pub enum TriggerMode ("trigger_mode") {
        Free => "free",
        Synced => "synced",
    }
    default Free
}

pub const MAX_VOICES: usize = 4;

const GAPPED_END: f32 = 0.2;
const SEAMLESS_END: f32 = 0.35;
const TWO_VOICE_END: f32 = 0.55;
const THREE_VOICE_END: f32 = 0.75;
/// Clock pulses shift genes below this morph and stretch time above it.
const GENE_SHIFT_LIMIT: f32 = 0.37;

/// Root, major third, fifth, octave.
const CHORD: [f64; MAX_VOICES] = [1.0, 1.259_921_049_894_873_2, 1.498_307_076_876_681_5, 2.0];
const PAN_THREE: [f32; 3] = [0.0, -0.6, 0.6];
const PAN_FOUR: [f32; MAX_VOICES] = [-0.2, 0.2, -0.7, 0.7];

const MIN_GENE_SECONDS: f32 = 0.001;
const PARAM_SMOOTHING: f32 = 0.001;

/// Grain layout for one morph setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphShape {
    pub voices: usize,
    /// Silence between grains as a fraction of the gene.
    pub gap: f32,
    pub panned: bool,
    pub chord: bool,
}

impl MorphShape {
    pub fn from_morph(morph: f32) -> Self {
        let morph = morph.clamp(0.0, 1.0);
        let (voices, gap) = if morph < GAPPED_END {
            (1, 1.0 - morph / GAPPED_END)
        } else if morph < SEAMLESS_END {
            (1, 0.0)
        } else if morph < TWO_VOICE_END {
            (2, 0.0)
        } else if morph < THREE_VOICE_END {
            (3, 0.0)
        } else {
            (4, 0.0)
        };
        Self {
            voices,
            gap,
            panned: morph >= TWO_VOICE_END,
            chord: morph >= THREE_VOICE_END,
        }
    }

    /// Samples between grain starts in free mode.
    pub fn spawn_interval(&self, gene_len: f64) -> f64 {
        if self.voices == 1 {
            gene_len * (1.0 + self.gap as f64)
        } else {
            gene_len / self.voices as f64
        }
    }

    fn pan(&self, slot: usize) -> f32 {
        match (self.panned, self.voices) {
            (true, 3) => PAN_THREE[slot % 3],
            (true, _) => PAN_FOUR[slot % MAX_VOICES],
            (false, _) => 0.0,
        }
    }

    fn ratio(&self, slot: usize) -> f64 {
        if self.chord {
            CHORD[slot % MAX_VOICES]
        } else {
            1.0
        }
    }
}

/// Gene length in samples for a splice of `splice_len` samples.
pub fn gene_length(splice_len: usize, gene_size: f32, sample_rate: f32) -> f64 {
    let len = splice_len as f64;
    let shortest = (MIN_GENE_SECONDS * sample_rate).max(1.0) as f64;
    if len <= shortest {
        return len.max(1.0);
    }
    len * (shortest / len).powf(gene_size.clamp(0.0, 1.0) as f64)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MorphageneCommand {
    Set(Param, f32),
    RecordMode(RecordMode),
    TriggerMode(TriggerMode),
    Record(bool),
    /// Place a marker at the current play position.
    MarkSplice,
    /// Remove the marker ending the current splice.
    DeleteMarker,
    /// Move to the next splice.
    Shift,
    /// Start a grain now.
    Trigger,
    Transport(Transport),
}

impl MorphageneCommand {
    pub fn from_param(name: &str, value: f32) -> Option<Self> {
        Param::from_name(name).map(|p| MorphageneCommand::Set(p, value))
    }

    pub fn from_mode(field: &str, value: &str) -> Option<Self> {
        match field {
            RecordMode::FIELD => RecordMode::from_name(value).map(MorphageneCommand::RecordMode),
            TriggerMode::FIELD => TriggerMode::from_name(value).map(MorphageneCommand::TriggerMode),
            _ => None,
        }
    }

    pub fn defaults() -> Vec<Self> {
        let mut commands: Vec<Self> = Param::ALL
            .iter()
            .map(|&p| MorphageneCommand::Set(p, p.default_value()))
            .collect();
        commands.push(MorphageneCommand::RecordMode(RecordMode::default()));
        commands.push(MorphageneCommand::TriggerMode(TriggerMode::default()));
        commands
    }
}

/// Where the recorder is writing.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Recorder {
    Idle,
    /// Appending at the end of the reel.
    Append { splice: usize },
    /// Overdubbing around a splice.
    Overdub {
        splice: usize,
        start: usize,
        len: usize,
        offset: usize,
    },
}

#[derive(Debug)]
pub struct Morphagene {
    sample_rate: f32,
    reel: [CircularBuffer; 2],
    recorded: usize,
    splices: SpliceSet,
    current: usize,

    varispeed: SmoothedParam,
    gene_size: SmoothedParam,
    slide: SmoothedParam,
    sos: SmoothedParam,
    morph: f32,
    organize: f32,
    organize_pending: bool,

    record_mode: RecordMode,
    trigger_mode: TriggerMode,
    recorder: Recorder,
    frozen: bool,
    /// Raised by commands, emitted at the top of the next block.
    pending: Option<Event>,

    voices: [GrainVoice; MAX_VOICES],
    spawn_count: usize,
    counter: f64,
    spawn_now: bool,
    gene_offset: f64,
    stretch_steps: usize,
}

impl Morphagene {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let capacity = config.samples_for(config.morphagene_seconds);
        let reel = [
            CircularBuffer::try_new(capacity, "morphagene reel left")?,
            CircularBuffer::try_new(capacity, "morphagene reel right")?,
        ];
        info!(
            capacity,
            seconds = config.morphagene_seconds,
            "morphagene reel allocated"
        );

        Ok(Self {
            sample_rate: config.sample_rate,
            reel,
            recorded: 0,
            splices: SpliceSet::new(),
            current: 0,
            varispeed: SmoothedParam::new(Param::Varispeed.default_value(), PARAM_SMOOTHING),
            gene_size: SmoothedParam::new(Param::GeneSize.default_value(), PARAM_SMOOTHING),
            slide: SmoothedParam::new(Param::Slide.default_value(), PARAM_SMOOTHING),
            sos: SmoothedParam::new(Param::Sos.default_value(), PARAM_SMOOTHING),
            morph: Param::Morph.default_value(),
            organize: Param::Organize.default_value(),
            organize_pending: false,
            record_mode: RecordMode::default(),
            trigger_mode: TriggerMode::default(),
            recorder: Recorder::Idle,
            frozen: false,
            pending: None,
            voices: [GrainVoice::new(config.sample_rate); MAX_VOICES],
            spawn_count: 0,
            counter: 0.0,
            spawn_now: true,
            gene_offset: 0.0,
            stretch_steps: 0,
        })
    }

    /// Replace the reel with prepared audio. Not for the audio thread.
    ///
    /// An empty `right` copies `left`. Markers must be ascending and inside
    /// the recording; 0 is implied.
    pub fn load_reel(
        &mut self,
        left: &[f32],
        right: &[f32],
        markers: &[usize],
    ) -> Result<(), EngineError> {
        let right = if right.is_empty() { left } else { right };
        let recorded = left.len().max(right.len());
        let capacity = self.reel[0].capacity();
        if recorded > capacity {
            return Err(EngineError::BufferTooLong {
                len: recorded,
                capacity,
            });
        }
        let splices = SpliceSet::from_markers(markers, recorded)?;

        self.reel[0].load(left)?;
        self.reel[1].load(right)?;
        self.recorded = recorded;
        self.splices = splices;
        self.recorder = Recorder::Idle;
        self.reset_playback();
        self.current = 0;

        info!(
            samples = recorded,
            splices = self.splices.len(),
            "morphagene reel loaded"
        );
        Ok(())
    }

    pub fn recorded_length(&self) -> usize {
        self.recorded
    }

    pub fn splices(&self) -> &SpliceSet {
        &self.splices
    }

    pub fn current_splice(&self) -> usize {
        self.current
    }

    pub fn is_recording(&self) -> bool {
        self.recorder != Recorder::Idle
    }

    pub fn morph_shape(&self) -> MorphShape {
        MorphShape::from_morph(self.morph)
    }

    pub fn voice_count(&self) -> usize {
        self.morph_shape().voices
    }

    pub fn gap_ratio(&self) -> f32 {
        self.morph_shape().gap
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// `(start, len)` of the current splice.
    fn current_bounds(&self) -> (usize, usize) {
        let (start, end) = self.splices.bounds(self.current, self.recorded);
        (start, end - start)
    }

    fn reset_playback(&mut self) {
        for voice in &mut self.voices {
            voice.reset();
        }
        self.spawn_count = 0;
        self.counter = 0.0;
        self.spawn_now = true;
        self.gene_offset = 0.0;
        self.stretch_steps = 0;
    }

    fn select_splice(&mut self, k: usize) {
        let k = k.min(self.splices.len() - 1);
        if k != self.current {
            self.current = k;
            self.gene_offset = 0.0;
            self.stretch_steps = 0;
        }
    }

    fn spawn_grain(&mut self, gene_size: f32, slide: f32, rate: f64) {
        if self.organize_pending {
            self.organize_pending = false;
            let last = self.splices.len() - 1;
            self.select_splice((self.organize * last as f32).round() as usize);
        }
        let (start, len) = self.current_bounds();
        if len == 0 {
            return;
        }
        // Busy voices keep playing; the grain is dropped.
        let Some(index) = self.voices.iter().position(|v| !v.is_active()) else {
            return;
        };
        let gene_len = gene_length(len, gene_size, self.sample_rate);
        let shape = self.morph_shape();
        let slot = self.spawn_count % shape.voices;

        let mut offset = self.gene_offset + slide as f64 * len as f64;
        if rate < 0.0 {
            // backwards grains start at the far end of their gene
            offset += gene_len;
        }
        let offset = offset.rem_euclid(len as f64);

        let gain = 1.0 / (shape.voices as f32).sqrt();
        self.voices[index].spawn(
            start,
            len,
            offset,
            gene_len,
            shape.ratio(slot),
            gain,
            shape.pan(slot),
        );
        self.spawn_count = self.spawn_count.wrapping_add(1);
    }

    fn clock_pulse(&mut self) {
        let (_, len) = self.current_bounds();
        if len > 0 {
            let gene_len = gene_length(len, self.gene_size.current(), self.sample_rate);
            if self.morph < GENE_SHIFT_LIMIT {
                self.gene_offset = (self.gene_offset + gene_len).rem_euclid(len as f64);
            } else {
                self.stretch_steps += 1;
                self.gene_offset = (self.stretch_steps as f64 * gene_len).rem_euclid(len as f64);
            }
        }
        if self.trigger_mode == TriggerMode::Synced {
            self.spawn_now = true;
        }
    }

    fn start_recording(&mut self) {
        if self.frozen || self.is_recording() {
            return;
        }
        let (start, len) = self.current_bounds();
        if self.record_mode == RecordMode::TimeLag && len > 0 {
            self.recorder = Recorder::Overdub {
                splice: self.current,
                start,
                len,
                offset: 0,
            };
            return;
        }
        if self.recorded >= self.reel[0].capacity() {
            return;
        }
        let splice = if self.recorded > 0 {
            self.place_marker(self.recorded)
        } else {
            0
        };
        self.recorder = Recorder::Append { splice };
    }

    /// Insert a marker and keep the splice indices we hold pointing at the
    /// same audio. Returns the splice the marker starts.
    fn place_marker(&mut self, position: usize) -> usize {
        let placed = self.splices.insert(position);
        if placed.evicted.is_some() {
            self.follow_splices(|k| placed.follow(k));
        }
        placed.splice
    }

    fn follow_splices(&mut self, follow: impl Fn(usize) -> usize) {
        self.current = follow(self.current);
        match &mut self.recorder {
            Recorder::Idle => {}
            Recorder::Append { splice } | Recorder::Overdub { splice, .. } => {
                *splice = follow(*splice);
            }
        }
    }

    fn stop_recording(&mut self) -> Option<Event> {
        let splice = match self.recorder {
            Recorder::Idle => return None,
            Recorder::Append { splice } | Recorder::Overdub { splice, .. } => splice,
        };
        self.recorder = Recorder::Idle;
        Some(Event::RecordingStopped {
            source: RecordSource::Reel { splice },
            length: self.recorded,
        })
    }

    fn record_frame<S: EventSink>(&mut self, left: f32, right: f32, sos: f32, events: &mut S) {
        match self.recorder {
            Recorder::Idle => {}
            Recorder::Append { .. } => {
                if self.recorded >= self.reel[0].capacity() {
                    if let Some(event) = self.stop_recording() {
                        events.emit(event);
                    }
                    return;
                }
                self.reel[0].write(self.recorded, left);
                self.reel[1].write(self.recorded, right);
                self.recorded += 1;
            }
            Recorder::Overdub {
                splice,
                start,
                len,
                offset,
            } => {
                let pos = start + offset;
                let old_l = self.reel[0].read(pos);
                let old_r = self.reel[1].read(pos);
                self.reel[0].write(pos, left + old_l * sos);
                self.reel[1].write(pos, right + old_r * sos);
                self.recorder = Recorder::Overdub {
                    splice,
                    start,
                    len,
                    offset: (offset + 1) % len,
                };
            }
        }
    }

    fn set_param(&mut self, param: Param, value: f32) {
        let Some(value) = param.clamp(value) else {
            return;
        };
        match param {
            Param::Varispeed => self.varispeed.set_target(value),
            Param::GeneSize => self.gene_size.set_target(value),
            Param::Slide => self.slide.set_target(value),
            Param::Morph => self.morph = value,
            Param::Organize => {
                if value != self.organize {
                    self.organize = value;
                    self.organize_pending = true;
                }
            }
            Param::Sos => self.sos.set_target(value),
        }
    }
}

impl Engine for Morphagene {
    type Command = MorphageneCommand;

    fn kind(&self) -> EngineKind {
        EngineKind::Morphagene
    }

    fn apply(&mut self, command: MorphageneCommand) {
        match command {
            MorphageneCommand::Set(param, value) => self.set_param(param, value),
            MorphageneCommand::RecordMode(mode) => self.record_mode = mode,
            MorphageneCommand::TriggerMode(mode) => self.trigger_mode = mode,
            MorphageneCommand::Record(true) => self.start_recording(),
            MorphageneCommand::Record(false) => {
                if let Some(event) = self.stop_recording() {
                    self.pending = Some(event);
                }
            }
            MorphageneCommand::MarkSplice => {
                let head = self
                    .voices
                    .iter()
                    .find(|v| v.is_active())
                    .map(GrainVoice::reel_position);
                if let Some(position) = head.filter(|&p| p > 0 && p < self.recorded) {
                    let (start, _) = self.current_bounds();
                    self.place_marker(position);
                    self.current = self.splices.splice_at(start);
                }
            }
            MorphageneCommand::DeleteMarker => {
                let k = self.current;
                if self.splices.merge_with_next(k) {
                    self.follow_splices(|s| if s > k { s - 1 } else { s });
                }
            }
            MorphageneCommand::Shift => {
                let next = (self.current + 1) % self.splices.len();
                self.organize_pending = false;
                self.select_splice(next);
                self.gene_offset = 0.0;
            }
            MorphageneCommand::Trigger => {
                self.counter = 0.0;
                self.spawn_now = true;
            }
            MorphageneCommand::Transport(transport) => match transport {
                Transport::Freeze(on) => {
                    self.frozen = on;
                    if on {
                        if let Some(event) = self.stop_recording() {
                            self.pending = Some(event);
                        }
                    }
                }
                Transport::Purge => {
                    for channel in &mut self.reel {
                        channel.clear();
                    }
                    self.recorded = 0;
                    self.splices.clear();
                    self.current = 0;
                    self.recorder = Recorder::Idle;
                    self.reset_playback();
                }
                Transport::Reset => self.reset_playback(),
                Transport::SetBpm(_) => {}
                Transport::ClockPulse => self.clock_pulse(),
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

        for i in 0..output.frames() {
            let (in_l, in_r) = input.frame(i);
            let rate = VarispeedCurve::GRANULAR.rate(self.varispeed.next()) as f64;
            let gene_size = self.gene_size.next();
            let slide = self.slide.next();
            let sos = self.sos.next();

            self.record_frame(in_l, in_r, sos, events);

            let (mut wet_l, mut wet_r) = (0.0, 0.0);
            if self.recorded > 0 {
                let mut spawn = std::mem::take(&mut self.spawn_now);
                if self.trigger_mode == TriggerMode::Free {
                    let (_, len) = self.current_bounds();
                    let gene_len = gene_length(len, gene_size, self.sample_rate);
                    self.counter += 1.0;
                    if self.counter >= self.morph_shape().spawn_interval(gene_len) {
                        self.counter = 0.0;
                        spawn = true;
                    }
                }
                if spawn {
                    self.spawn_grain(gene_size, slide, rate);
                }

                for voice in &mut self.voices {
                    let frame = voice.next(&self.reel, rate);
                    wet_l += frame.left;
                    wet_r += frame.right;
                    if frame.ended {
                        events.emit(Event::EndOfGene);
                    }
                }
            }

            output.write(
                i,
                in_l * (1.0 - sos) + wet_l * sos,
                in_r * (1.0 - sos) + wet_r * sos,
            );
        }
    }

    fn params(&self) -> ParamMap {
        Param::ALL
            .iter()
            .map(|&p| {
                let value = match p {
                    Param::Varispeed => self.varispeed.target(),
                    Param::GeneSize => self.gene_size.target(),
                    Param::Slide => self.slide.target(),
                    Param::Morph => self.morph,
                    Param::Organize => self.organize,
                    Param::Sos => self.sos.target(),
                };
                (p.name().to_string(), value)
            })
            .collect()
    }

    fn modes(&self) -> ModeMap {
        [
            (RecordMode::FIELD, self.record_mode.name()),
            (TriggerMode::FIELD, self.trigger_mode.name()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn param_command(&self, name: &str, value: f32) -> Option<MorphageneCommand> {
        MorphageneCommand::from_param(name, value)
    }

    fn mode_command(&self, field: &str, value: &str) -> Option<MorphageneCommand> {
        MorphageneCommand::from_mode(field, value)
    }

    fn default_commands(&self) -> Vec<MorphageneCommand> {
        MorphageneCommand::defaults()
    }

    fn reset(&mut self) {
        self.reset_playback();
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

    fn run(engine: &mut Morphagene, input: &[f32], events: &mut Vec<Event>) -> Vec<f32> {
        let mut l = vec![0.0; input.len()];
        let mut r = vec![0.0; input.len()];
        engine.process(
            &AudioInput::mono(input),
            &mut AudioOutput::new(&mut l, &mut r),
            events,
        );
        l
    }

    fn sine(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 * 0.05).sin() * 0.5).collect()
    }

    #[test]
    fn test_empty_reel_is_silent() {
        let mut engine = Morphagene::new(&config()).unwrap();
        let mut l = vec![1.0; 1024];
        let mut r = vec![1.0; 1024];
        engine.process(
            &AudioInput::silent(),
            &mut AudioOutput::new(&mut l, &mut r),
            &mut Discard,
        );
        assert!(l.iter().chain(r.iter()).all(|&s| s == 0.0));
    }

    #[test]
    fn test_morph_bands() {
        assert_eq!(MorphShape::from_morph(0.0).gap, 1.0);
        assert!((MorphShape::from_morph(0.1).gap - 0.5).abs() < 1e-6);

        let seamless = MorphShape::from_morph(0.3);
        assert_eq!((seamless.voices, seamless.gap), (1, 0.0));
        assert_eq!(MorphShape::from_morph(0.36).voices, 2);
        assert_eq!(MorphShape::from_morph(0.6).voices, 3);
        assert!(MorphShape::from_morph(0.6).panned);
        let full = MorphShape::from_morph(0.9);
        assert_eq!(full.voices, 4);
        assert!(full.chord);
        assert_eq!(full.ratio(3), 2.0);
    }

    #[test]
    fn test_gene_length_curve() {
        assert_eq!(gene_length(8_000, 0.0, 8_000.0), 8_000.0);
        assert!((gene_length(8_000, 1.0, 8_000.0) - 8.0).abs() < 1e-9);
        let half = gene_length(8_000, 0.5, 8_000.0);
        assert!((half - (8_000.0f64 * 8.0).sqrt()).abs() < 1e-6);
        assert_eq!(gene_length(4, 1.0, 8_000.0), 4.0);
    }

    #[test]
    fn test_record_new_splices() {
        let mut engine = Morphagene::new(&config()).unwrap();
        let mut events = Vec::new();
        engine.apply(MorphageneCommand::Record(true));
        run(&mut engine, &sine(500), &mut events);
        engine.apply(MorphageneCommand::Record(false));
        engine.apply(MorphageneCommand::Record(true));
        run(&mut engine, &sine(300), &mut events);
        engine.apply(MorphageneCommand::Record(false));
        run(&mut engine, &[0.0; 4], &mut events);

        assert_eq!(engine.recorded_length(), 800);
        assert_eq!(engine.splices().markers(), &[0, 500]);
        assert!(events.contains(&Event::RecordingStopped {
            source: RecordSource::Reel { splice: 1 },
            length: 800,
        }));
    }

    #[test]
    fn test_full_marker_set_keeps_indices_on_their_audio() {
        let mut engine = Morphagene::new(&config()).unwrap();
        let markers: Vec<usize> = (0..MAX_SPLICES).map(|i| i * 10).collect();
        engine.load_reel(&sine(3_000), &[], &markers).unwrap();
        engine.select_splice(150);

        // appending needs a new marker, which evicts the one at 10
        engine.apply(MorphageneCommand::Record(true));
        assert_eq!(engine.splices().len(), MAX_SPLICES);
        assert_eq!(engine.current_splice(), 149);
        assert_eq!(engine.splices().markers()[149], 1_500);

        let mut events = Vec::new();
        run(&mut engine, &sine(100), &mut events);
        engine.apply(MorphageneCommand::Record(false));
        run(&mut engine, &[0.0; 4], &mut events);
        assert_eq!(engine.splices().markers()[MAX_SPLICES - 1], 3_000);
        assert!(events.contains(&Event::RecordingStopped {
            source: RecordSource::Reel {
                splice: MAX_SPLICES - 1
            },
            length: 3_100,
        }));
    }

    #[test]
    fn test_delete_marker_while_appending() {
        let mut engine = Morphagene::new(&config()).unwrap();
        engine.load_reel(&sine(900), &[], &[0, 300, 600]).unwrap();
        let mut events = Vec::new();
        engine.apply(MorphageneCommand::Record(true));
        run(&mut engine, &sine(50), &mut events);
        engine.apply(MorphageneCommand::DeleteMarker);
        assert_eq!(engine.splices().markers(), &[0, 600, 900]);
        engine.apply(MorphageneCommand::Record(false));
        run(&mut engine, &[0.0; 4], &mut events);
        assert!(events.contains(&Event::RecordingStopped {
            source: RecordSource::Reel { splice: 2 },
            length: 950,
        }));
    }

    #[test]
    fn test_recording_stops_at_capacity() {
        let mut engine = Morphagene::new(&config()).unwrap();
        let mut events = Vec::new();
        engine.apply(MorphageneCommand::Record(true));
        run(&mut engine, &vec![0.1; 8_100], &mut events);
        assert!(!engine.is_recording());
        assert_eq!(engine.recorded_length(), 8_000);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::RecordingStopped { length: 8_000, .. })));
    }

    #[test]
    fn test_time_lag_overdubs_in_place() {
        let mut engine = Morphagene::new(&config()).unwrap();
        engine.load_reel(&[0.5; 100], &[], &[]).unwrap();
        engine.apply(MorphageneCommand::RecordMode(RecordMode::TimeLag));
        engine.apply(MorphageneCommand::Set(Param::Sos, 0.5));
        engine.sos.snap();
        engine.apply(MorphageneCommand::Record(true));
        run(&mut engine, &[0.1; 100], &mut Vec::new());
        assert_eq!(engine.recorded_length(), 100);
        assert!((engine.reel[0].read(10) - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_playback_emits_genes() {
        let mut engine = Morphagene::new(&config()).unwrap();
        engine.load_reel(&sine(800), &[], &[]).unwrap();
        engine.apply(MorphageneCommand::Set(Param::GeneSize, 0.6));
        engine.gene_size.snap();
        let mut events = Vec::new();
        let out = run(&mut engine, &[0.0; 4_000], &mut events);
        assert!(out.iter().any(|&s| s.abs() > 0.01));
        assert!(out.iter().all(|s| s.is_finite()));
        assert!(events.iter().filter(|e| **e == Event::EndOfGene).count() > 3);
    }

    #[test]
    fn test_overlap_uses_several_voices() {
        let mut engine = Morphagene::new(&config()).unwrap();
        engine.load_reel(&sine(800), &[], &[]).unwrap();
        engine.apply(MorphageneCommand::Set(Param::Morph, 0.9));
        run(&mut engine, &[0.0; 2_000], &mut Vec::new());
        assert!(engine.active_voices() >= 3);
    }

    #[test]
    fn test_busy_voices_are_never_restarted() {
        let mut engine = Morphagene::new(&config()).unwrap();
        engine.load_reel(&sine(800), &[], &[]).unwrap();
        engine.apply(MorphageneCommand::TriggerMode(TriggerMode::Synced));
        engine.apply(MorphageneCommand::Transport(Transport::Reset));
        engine.spawn_now = false;

        for _ in 0..MAX_VOICES {
            engine.spawn_grain(0.5, 0.0, 1.0);
        }
        assert_eq!(engine.active_voices(), MAX_VOICES);
        run(&mut engine, &[0.0; 10], &mut Vec::new());

        let before: Vec<f64> = engine.voices.iter().map(GrainVoice::progress).collect();
        engine.spawn_grain(0.5, 0.0, 1.0);
        let after: Vec<f64> = engine.voices.iter().map(GrainVoice::progress).collect();
        assert_eq!(before, after);
        assert_eq!(engine.active_voices(), MAX_VOICES);

        // once the set has finished a new grain gets a slot
        run(&mut engine, &[0.0; 200], &mut Vec::new());
        assert_eq!(engine.active_voices(), 0);
        engine.spawn_grain(0.5, 0.0, 1.0);
        assert_eq!(engine.active_voices(), 1);
    }

    #[test]
    fn test_synced_mode_waits_for_clock() {
        let mut engine = Morphagene::new(&config()).unwrap();
        engine.load_reel(&sine(800), &[], &[]).unwrap();
        engine.apply(MorphageneCommand::TriggerMode(TriggerMode::Synced));
        engine.apply(MorphageneCommand::Transport(Transport::Reset));
        engine.spawn_now = false;
        run(&mut engine, &[0.0; 100], &mut Vec::new());
        assert_eq!(engine.active_voices(), 0);
        engine.apply(MorphageneCommand::Transport(Transport::ClockPulse));
        run(&mut engine, &[0.0; 10], &mut Vec::new());
        assert_eq!(engine.active_voices(), 1);
    }

    #[test]
    fn test_clock_shifts_gene() {
        let mut engine = Morphagene::new(&config()).unwrap();
        engine.load_reel(&sine(1_000), &[], &[]).unwrap();
        engine.apply(MorphageneCommand::Set(Param::GeneSize, 1.0));
        engine.gene_size.snap();
        engine.apply(MorphageneCommand::Transport(Transport::ClockPulse));
        assert!((engine.gene_offset - 8.0).abs() < 1e-9);
        engine.apply(MorphageneCommand::Transport(Transport::ClockPulse));
        assert!((engine.gene_offset - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_shift_and_delete_marker() {
        let mut engine = Morphagene::new(&config()).unwrap();
        engine.load_reel(&sine(900), &[], &[0, 300, 600]).unwrap();
        engine.apply(MorphageneCommand::Shift);
        assert_eq!(engine.current_splice(), 1);
        engine.apply(MorphageneCommand::DeleteMarker);
        assert_eq!(engine.splices().markers(), &[0, 300]);
        engine.apply(MorphageneCommand::Shift);
        assert_eq!(engine.current_splice(), 0);
    }

    #[test]
    fn test_organize_applies_on_next_grain() {
        let mut engine = Morphagene::new(&config()).unwrap();
        engine.load_reel(&sine(900), &[], &[0, 300, 600]).unwrap();
        engine.apply(MorphageneCommand::Set(Param::Organize, 1.0));
        assert_eq!(engine.current_splice(), 0);
        engine.apply(MorphageneCommand::Trigger);
        run(&mut engine, &[0.0; 2], &mut Vec::new());
        assert_eq!(engine.current_splice(), 2);
    }

    #[test]
    fn test_load_rejects_oversized_reel() {
        let mut engine = Morphagene::new(&config()).unwrap();
        assert!(matches!(
            engine.load_reel(&vec![0.0; 9_000], &[], &[]),
            Err(EngineError::BufferTooLong { .. })
        ));
        assert!(matches!(
            engine.load_reel(&[0.0; 100], &[], &[0, 50, 20]),
            Err(EngineError::InvalidMarkers(_))
        ));
    }

    #[test]
    fn test_purge_empties_reel() {
        let mut engine = Morphagene::new(&config()).unwrap();
        engine.load_reel(&sine(900), &[], &[0, 300]).unwrap();
        engine.apply(MorphageneCommand::Transport(Transport::Purge));
        assert_eq!(engine.recorded_length(), 0);
        assert_eq!(engine.splices().markers(), &[0]);
        let out = run(&mut engine, &[0.0; 64], &mut Vec::new());
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
