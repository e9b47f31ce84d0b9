//! Block driver sitting between an audio callback and one engine.

/*
Engine Host
===========

The device callback knows nothing about engines. It hands over whatever
block size the driver picked and expects the buffer filled before it
returns. The host turns that into the contract every engine relies on:

  1. Drain pending commands. They apply atomically relative to the sample
     loop: a block never sees half a preset.

  2. Split the block into pieces no larger than `max_block_size`, so
     engines can size any scratch space once at construction.

  3. Process each piece. Missing input channels stay `None` and the engine
     reads them as silence.

  4. Track output peaks and emit `Event::Meter` every `meter_interval`
     blocks.

    device ──→ [drain commands] ──→ [split] ──→ engine.process ──→ [meter] ──→ device
                     ↑                                                 │
               control thread                                       events
*/

use crate::{
    config::EngineConfig,
    control::{CommandReceiver, Event, EventSink, Levels},
    engine::Engine,
    io::{AudioInput, AudioOutput},
};

/// Blocks between meter events.
const DEFAULT_METER_INTERVAL: u32 = 8;

pub struct EngineHost<E, R, S>
where
    E: Engine,
    R: CommandReceiver<E::Command>,
    S: EventSink,
{
    engine: E,
    commands: R,
    events: S,
    max_block_size: usize,
    meter_interval: u32,
    blocks_since_meter: u32,
    peaks: Levels,
}

impl<E, R, S> EngineHost<E, R, S>
where
    E: Engine,
    R: CommandReceiver<E::Command>,
    S: EventSink,
{
    pub fn new(engine: E, commands: R, events: S, config: &EngineConfig) -> Self {
        Self {
            engine,
            commands,
            events,
            max_block_size: config.max_block_size.max(1),
            meter_interval: DEFAULT_METER_INTERVAL,
            blocks_since_meter: 0,
            peaks: Levels::default(),
        }
    }

    pub fn with_meter_interval(mut self, blocks: u32) -> Self {
        self.meter_interval = blocks.max(1);
        self
    }

    /// Called from the audio callback. Never blocks or allocates.
    pub fn process(&mut self, input: &AudioInput<'_>, output: &mut AudioOutput<'_>) {
        while let Some(command) = self.commands.pop() {
            self.engine.apply(command);
        }

        let frames = output.frames();
        let mut start = 0;
        while start < frames {
            let end = (start + self.max_block_size).min(frames);
            let piece = input.slice(start, end);
            let mut out = output.slice_mut(start, end);
            self.engine.process(&piece, &mut out, &mut self.events);
            start = end;
        }

        self.meter(output, frames);
    }

    fn meter(&mut self, output: &AudioOutput<'_>, frames: usize) {
        let peak = |buf: &[f32]| buf[..frames].iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
        self.peaks.left = self.peaks.left.max(peak(&*output.left));
        self.peaks.right = self.peaks.right.max(peak(&*output.right));

        self.blocks_since_meter += 1;
        if self.blocks_since_meter >= self.meter_interval {
            self.events.emit(Event::Meter(self.peaks));
            self.peaks = Levels::default();
            self.blocks_since_meter = 0;
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Direct access from whichever thread owns the host, e.g. to inject
    /// clock pulses between pieces of a device block.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn events_mut(&mut self) -> &mut S {
        &mut self.events
    }

    pub fn into_parts(self) -> (E, R, S) {
        (self.engine, self.commands, self.events)
    }
}
