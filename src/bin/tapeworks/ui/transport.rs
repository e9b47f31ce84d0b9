//! Transport bar widget - engine, clock, freeze/record state and meters

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::UiState;

const METER_WIDTH: usize = 10;

/// Peak level as a short bar plus dBFS
fn meter(level: f32) -> String {
    let filled = (level.clamp(0.0, 1.0) * METER_WIDTH as f32).round() as usize;
    let db = 20.0 * level.max(1e-6).log10();
    format!(
        "{}{} {:>5.1}dB",
        "▮".repeat(filled),
        "·".repeat(METER_WIDTH - filled),
        db
    )
}

pub fn render_transport(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().title(" tapeworks ").borders(Borders::ALL);

    let clock_symbol = if state.clock_running { "▶" } else { "⏸" };
    let flag = |on: bool, label: &'static str, color: Color| {
        Span::styled(
            format!("{label}  "),
            Style::default().fg(if on { color } else { Color::DarkGray }),
        )
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {}  ", state.kind.name()),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!("{} {:.0} BPM  ", clock_symbol, state.bpm),
            Style::default().fg(if state.clock_running {
                Color::Green
            } else {
                Color::Yellow
            }),
        ),
        flag(state.frozen, "FREEZE", Color::LightBlue),
        flag(state.recording, "REC", Color::Red),
        Span::styled(
            format!("{:.1}kHz  ", state.sample_rate / 1000.0),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("ticks {}  ", state.ticks),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("L {}  R {}", meter(state.levels.left), meter(state.levels.right)),
            Style::default().fg(Color::Magenta),
        ),
    ]);

    frame.render_widget(Paragraph::new(line).block(block), area);
}
