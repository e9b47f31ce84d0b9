//! Tapeworks - audio setup and the realtime callback

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Producer, RingBuffer};
use tracing::{error, info, warn};

use tapeworks::{
    control::{Event, Transport},
    engine::{Engine, EngineHost, EngineKind, EngineSlot, UnitCommand},
    io::{
        converter::{deinterleave, interleave},
        AudioInput, AudioOutput,
    },
    EngineConfig, MAX_BLOCK_SIZE,
};

use super::{
    clock::Clock,
    ui::{ClockMessage, UiApp, UiState},
};

const COMMAND_QUEUE: usize = 256;
const EVENT_QUEUE: usize = 1024;
const CLOCK_QUEUE: usize = 16;
/// Interleaved stereo frames from the input device, about half a second
const INPUT_QUEUE: usize = 48_000;
/// Mono samples for the scope and spectrum
const SCOPE_QUEUE: usize = 8192;

/// Main application builder
pub struct Tapeworks {
    kind: EngineKind,
    config: EngineConfig,
    bpm: f32,
}

impl Tapeworks {
    pub fn new(kind: EngineKind, config: EngineConfig) -> Self {
        Self {
            kind,
            config,
            bpm: 120.0,
        }
    }

    /// Tempo of the internal clock
    pub fn bpm(mut self, bpm: f32) -> Self {
        self.bpm = bpm;
        self
    }

    /// Open the devices, start the engine and hand the terminal to the UI.
    pub fn run(self) -> EyreResult<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| eyre!("no default output device available"))?;
        let supported = device
            .default_output_config()
            .wrap_err("failed to fetch default output config")?;

        let sample_rate = supported.sample_rate().0 as f32;
        let channels = supported.channels() as usize;
        let config = self.config.with_sample_rate(sample_rate);

        let mut slot = EngineSlot::default();
        slot.initialize(self.kind, &config);
        if let Some(err) = slot.error() {
            return Err(eyre!("{} could not start: {err}", self.kind.name()));
        }
        let mut unit = slot
            .take()
            .ok_or_else(|| eyre!("{} could not start", self.kind.name()))?;
        unit.apply(UnitCommand::Transport(Transport::SetBpm(self.bpm)));

        let initial = UiState::new(
            self.kind,
            sample_rate,
            self.bpm,
            &unit.params(),
            &unit.modes(),
        );

        let (command_tx, command_rx) = RingBuffer::<UnitCommand>::new(COMMAND_QUEUE);
        let (event_tx, event_rx) = RingBuffer::<Event>::new(EVENT_QUEUE);
        let (clock_tx, mut clock_rx) = RingBuffer::<ClockMessage>::new(CLOCK_QUEUE);
        let (input_tx, mut input_rx) = RingBuffer::<f32>::new(INPUT_QUEUE);
        let (mut scope_tx, scope_rx) = RingBuffer::<f32>::new(SCOPE_QUEUE);

        let input_stream = open_input(&host, input_tx)?;
        let has_input = input_stream.is_some();

        info!(
            engine = self.kind.name(),
            sample_rate,
            channels,
            has_input,
            "starting audio"
        );

        let mut engine = EngineHost::new(unit, command_rx, event_tx, &config);
        let mut clock = Clock::new(self.bpm as f64, sample_rate as f64);
        let block = config.max_block_size.min(MAX_BLOCK_SIZE).max(1);
        let mut in_l = vec![0.0f32; block];
        let mut in_r = vec![0.0f32; block];
        let mut out_l = vec![0.0f32; block];
        let mut out_r = vec![0.0f32; block];
        let mut pair = [0.0f32; 2];

        let stream = device.build_output_stream(
            &supported.into(),
            move |data: &mut [f32], _| {
                while let Ok(message) = clock_rx.pop() {
                    match message {
                        ClockMessage::SetBpm(bpm) => {
                            clock.set_bpm(bpm as f64);
                            engine
                                .engine_mut()
                                .apply(UnitCommand::Transport(Transport::SetBpm(bpm)));
                        }
                        ClockMessage::Toggle => clock.toggle(),
                    }
                }

                let total = data.len() / channels.max(1);
                let mut done = 0;
                while done < total {
                    if clock.take_pulse() {
                        engine
                            .engine_mut()
                            .apply(UnitCommand::Transport(Transport::ClockPulse));
                    }
                    let n = clock.frames_until_pulse((total - done).min(block));

                    for i in 0..n {
                        for sample in pair.iter_mut() {
                            *sample = input_rx.pop().unwrap_or(0.0);
                        }
                        in_l[i] = pair[0];
                        in_r[i] = pair[1];
                    }
                    let input = if has_input {
                        AudioInput::stereo(&in_l[..n], &in_r[..n])
                    } else {
                        AudioInput::silent()
                    };
                    let mut output = AudioOutput::new(&mut out_l[..n], &mut out_r[..n]);
                    engine.process(&input, &mut output);

                    let frames = &mut data[done * channels..(done + n) * channels];
                    interleave(&out_l[..n], &out_r[..n], channels, frames);
                    for (l, r) in out_l[..n].iter().zip(&out_r[..n]) {
                        let _ = scope_tx.push(0.5 * (l + r));
                    }

                    clock.advance(n);
                    done += n;
                }
            },
            |err| error!(%err, "output stream error"),
            None,
        )?;
        stream.play()?;

        let mut ui = UiApp::new(command_tx, clock_tx, event_rx, scope_rx, initial);
        let mut terminal = ratatui::init();
        let result = ui.run(&mut terminal);
        ratatui::restore();

        drop(stream);
        drop(input_stream);
        info!("stopped");
        result
    }
}

/// Start the default input device, pushing stereo frames into `tx`.
///
/// Running without an input device is fine; the engine then hears silence.
fn open_input(host: &cpal::Host, mut tx: Producer<f32>) -> EyreResult<Option<cpal::Stream>> {
    let Some(device) = host.default_input_device() else {
        warn!("no input device, running without input");
        return Ok(None);
    };
    let supported = device
        .default_input_config()
        .wrap_err("failed to fetch default input config")?;
    let channels = supported.channels() as usize;
    let mut left = vec![0.0f32; MAX_BLOCK_SIZE];
    let mut right = vec![0.0f32; MAX_BLOCK_SIZE];

    let stream = device.build_input_stream(
        &supported.into(),
        move |data: &[f32], _| {
            for chunk in data.chunks(MAX_BLOCK_SIZE * channels.max(1)) {
                let frames = deinterleave(chunk, channels, &mut left, &mut right);
                for (&l, &r) in left[..frames].iter().zip(&right[..frames]) {
                    // Drop whole frames so the channels never swap.
                    if tx.slots() < 2 {
                        return;
                    }
                    let _ = tx.push(l);
                    let _ = tx.push(r);
                }
            }
        },
        |err| error!(%err, "input stream error"),
        None,
    )?;
    stream.play()?;
    Ok(Some(stream))
}
