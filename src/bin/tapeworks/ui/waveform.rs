//! Output scope

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};

/// Draw the last samples of the summed output. The vertical range grows
/// past ±1 when the engine clips so overs stay visible.
pub fn render_waveform(frame: &mut Frame, area: Rect, samples: &[f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
    let range = peak.max(1.0) as f64;
    let title = if peak > 1.0 {
        format!(" Output  over {peak:.2} ")
    } else {
        " Output ".to_string()
    };

    let len = samples.len().max(1) as f64;
    let data: Vec<(f64, f64)> = samples
        .iter()
        .enumerate()
        .map(|(i, &sample)| (i as f64 / len, sample as f64))
        .collect();

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(if peak > 1.0 { Color::Red } else { Color::Cyan }))
        .data(&data);

    let chart = Chart::new(vec![dataset])
        .block(Block::default().title(title).borders(Borders::ALL))
        .x_axis(
            Axis::default()
                .bounds([0.0, 1.0])
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([-range, range])
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}
