//! Knob and mode panel

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::state::{ParamRow, UiState};

const BAR_WIDTH: usize = 20;

fn bar(row: &ParamRow) -> String {
    let filled = (row.normalized().clamp(0.0, 1.0) * BAR_WIDTH as f32).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

pub fn render_params(frame: &mut Frame, area: Rect, state: &UiState) {
    let mode_rows = state.modes.len() as u16 + 2;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(mode_rows)])
        .split(area);

    let knobs: Vec<Line> = state
        .params
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let selected = i == state.selected_param;
            let style = if selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(vec![
                Span::styled(if selected { "▸ " } else { "  " }, style),
                Span::styled(format!("{:<12}", row.name), style),
                Span::styled(bar(row), Style::default().fg(Color::Cyan)),
                Span::styled(format!(" {:>6.2}", row.value), style),
            ])
        })
        .collect();
    let title = format!(" {} ", state.kind.name());
    frame.render_widget(
        Paragraph::new(knobs).block(Block::default().title(title).borders(Borders::ALL)),
        chunks[0],
    );

    let modes: Vec<Line> = state
        .modes
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let style = if i == state.selected_mode {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(vec![
                Span::styled(format!("  {:<16}", row.field), style),
                Span::styled(row.value(), Style::default().fg(Color::Green)),
            ])
        })
        .collect();
    frame.render_widget(
        Paragraph::new(modes).block(Block::default().title(" Modes ").borders(Borders::ALL)),
        chunks[1],
    );
}
