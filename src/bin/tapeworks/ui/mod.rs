//! TUI module for tapeworks
//!
//! Knobs, mode switches and transport on the keyboard; scope, spectrum and
//! meters on screen.

mod params;
pub mod state;
mod spectrum;
mod transport;
mod waveform;

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph},
    DefaultTerminal, Frame,
};
use rtrb::{Consumer, Producer};
use std::time::Duration;
use tracing::{debug, warn};

use tapeworks::{
    control::{self, Transport},
    engine::UnitCommand,
};

pub use state::{ClockMessage, UiState};

use params::render_params;
use spectrum::{render_spectrum, SpectrumAnalyzer};
use transport::render_transport;
use waveform::render_waveform;

/// Samples shown by the scope and fed to the FFT
const VIS_BUFFER_SIZE: usize = 1024;

/// Knob step in percent of range; Shift multiplies it by ten.
const FINE_STEP: f32 = 1.0;
const COARSE_STEP: f32 = 10.0;

const BPM_STEP: f32 = 1.0;

/// UI application state
pub struct UiApp {
    commands: Producer<UnitCommand>,
    clock: Producer<ClockMessage>,
    events: Consumer<control::Event>,
    audio_rx: Consumer<f32>,
    state: UiState,
    audio_buffer: Vec<f32>,
    spectrum: SpectrumAnalyzer,
    should_quit: bool,
}

impl UiApp {
    pub fn new(
        commands: Producer<UnitCommand>,
        clock: Producer<ClockMessage>,
        events: Consumer<control::Event>,
        audio_rx: Consumer<f32>,
        state: UiState,
    ) -> Self {
        let spectrum = SpectrumAnalyzer::new(VIS_BUFFER_SIZE, state.sample_rate);
        Self {
            commands,
            clock,
            events,
            audio_rx,
            state,
            audio_buffer: vec![0.0; VIS_BUFFER_SIZE],
            spectrum,
            should_quit: false,
        }
    }

    /// Run the UI event loop
    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.poll_audio();
            self.poll_events();

            terminal.draw(|frame| self.render(frame))?;

            // ~60fps
            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }
        }

        Ok(())
    }

    fn poll_audio(&mut self) {
        let mut fresh = false;
        while let Ok(sample) = self.audio_rx.pop() {
            self.audio_buffer.push(sample);
            fresh = true;
        }
        if self.audio_buffer.len() > VIS_BUFFER_SIZE {
            let excess = self.audio_buffer.len() - VIS_BUFFER_SIZE;
            self.audio_buffer.drain(0..excess);
        }
        if fresh {
            self.spectrum.update(&self.audio_buffer);
        }
    }

    fn poll_events(&mut self) {
        while let Ok(event) = self.events.pop() {
            self.state.observe(event);
        }
    }

    fn send(&mut self, command: UnitCommand) {
        debug!(?command, "sending");
        if self.commands.push(command).is_err() {
            warn!("command queue full, dropping command");
            self.state.push_log("command queue full".to_string());
        }
    }

    fn send_clock(&mut self, message: ClockMessage) {
        if self.clock.push(message).is_err() {
            warn!("clock queue full");
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let step = if key.modifiers.contains(KeyModifiers::SHIFT) {
            COARSE_STEP
        } else {
            FINE_STEP
        };

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Up => self.state.select_param(-1),
            KeyCode::Down => self.state.select_param(1),
            KeyCode::Left => {
                if let Some(command) = self.state.nudge(-step) {
                    self.send(command);
                }
            }
            KeyCode::Right => {
                if let Some(command) = self.state.nudge(step) {
                    self.send(command);
                }
            }
            KeyCode::Tab => self.state.select_mode(),
            KeyCode::Char('m') => {
                if let Some(command) = self.state.cycle_mode() {
                    self.send(command);
                }
            }
            KeyCode::Char('f') => {
                let command = self.state.toggle_freeze();
                self.send(command);
            }
            KeyCode::Char('p') => {
                self.send(UnitCommand::Transport(Transport::Purge));
                self.state.push_log("purged".to_string());
            }
            KeyCode::Char('r') => {
                self.send(UnitCommand::Transport(Transport::Reset));
                self.state.frozen = false;
                self.state.recording = false;
                self.state.push_log("reset".to_string());
            }
            KeyCode::Char(' ') => {
                if let Some(command) = self.state.toggle_record() {
                    self.send(command);
                }
            }
            KeyCode::Char('t') => {
                if let Some(command) = self.state.trigger() {
                    self.send(command);
                }
            }
            KeyCode::Char('c') => {
                self.state.clock_running = !self.state.clock_running;
                self.send_clock(ClockMessage::Toggle);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let message = self.state.change_bpm(BPM_STEP);
                self.send_clock(message);
            }
            KeyCode::Char('-') => {
                let message = self.state.change_bpm(-BPM_STEP);
                self.send_clock(message);
            }
            _ => {}
        }
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        // transport, body, log, help
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(8),
                Constraint::Length(1),
            ])
            .split(area);

        render_transport(frame, rows[0], &self.state);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(rows[1]);
        render_params(frame, body[0], &self.state);

        let scopes = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(body[1]);
        render_waveform(frame, scopes[0], &self.audio_buffer);
        render_spectrum(frame, scopes[1], self.spectrum.data());

        let log: Vec<Line> = self.state.log.iter().map(|l| Line::from(l.as_str())).collect();
        let log = Paragraph::new(log).block(Block::default().title(" Events ").borders(Borders::ALL));
        frame.render_widget(log, rows[2]);

        let help = Paragraph::new(
            " [Q] Quit  [↑↓] Select  [←→] Adjust  [Tab/M] Mode  [F] Freeze  [P] Purge  [R] Reset  [Space] Rec  [T] Trig  [C] Clock  [+/-] BPM",
        )
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, rows[3]);
    }
}
