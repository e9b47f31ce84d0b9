//! Spectrum analyzer widget
//!
//! FFT over the scope buffer with log-spaced bins and a falling peak
//! display, so short grains and glitches stay readable.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use tapeworks::dsp::window::hann;

/// Number of frequency bins to display
const SPECTRUM_BINS: usize = 48;
const MIN_HZ: f64 = 20.0;
const FLOOR_DB: f64 = -100.0;
/// dB a bin may drop per update
const FALL_DB: f64 = 1.5;

pub struct SpectrumAnalyzer {
    window: Vec<f32>,
    /// FFT bin for each displayed point
    bin_indices: Vec<usize>,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    /// (log10 frequency, dB)
    spectrum: Vec<(f64, f64)>,
}

impl SpectrumAnalyzer {
    pub fn new(buffer_len: usize, sample_rate: f32) -> Self {
        let buffer_len = buffer_len.max(2);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(buffer_len);

        let last = (buffer_len - 1) as f32;
        let window = (0..buffer_len).map(|i| hann(i as f32 / last)).collect();

        let nyquist = (sample_rate as f64 / 2.0).min(20_000.0).max(MIN_HZ * 2.0);
        let half = buffer_len / 2;
        let mut bin_indices = Vec::with_capacity(SPECTRUM_BINS);
        let mut spectrum = Vec::with_capacity(SPECTRUM_BINS);
        for i in 0..SPECTRUM_BINS {
            let t = i as f64 / (SPECTRUM_BINS - 1) as f64;
            let freq = MIN_HZ * (nyquist / MIN_HZ).powf(t);
            let index = (freq * buffer_len as f64 / sample_rate as f64).round() as usize;
            bin_indices.push(index.clamp(1, half - 1));
            spectrum.push((freq.log10(), FLOOR_DB));
        }

        Self {
            window,
            bin_indices,
            fft,
            scratch: vec![Complex::new(0.0, 0.0); buffer_len],
            spectrum,
        }
    }

    /// Analyse `buffer`; ignored unless it matches the FFT size.
    pub fn update(&mut self, buffer: &[f32]) {
        if buffer.len() != self.window.len() {
            return;
        }

        for ((bin, &sample), &w) in self.scratch.iter_mut().zip(buffer).zip(&self.window) {
            *bin = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        for (point, &index) in self.spectrum.iter_mut().zip(&self.bin_indices) {
            let power = self.scratch[index].norm_sqr().max(1e-12) as f64;
            let db = (10.0 * power.log10()).max(FLOOR_DB);
            point.1 = db.max(point.1 - FALL_DB);
        }
    }

    pub fn data(&self) -> &[(f64, f64)] {
        &self.spectrum
    }
}

pub fn render_spectrum(frame: &mut Frame, area: Rect, spectrum: &[(f64, f64)]) {
    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Green))
        .data(spectrum);

    let lo = spectrum.first().map(|p| p.0).unwrap_or(MIN_HZ.log10());
    let hi = spectrum.last().map(|p| p.0).unwrap_or(lo + 1.0);
    let top = spectrum.iter().map(|p| p.1).fold(FLOOR_DB, f64::max);

    let chart = Chart::new(vec![dataset])
        .block(Block::default().title(" Spectrum ").borders(Borders::ALL))
        .x_axis(
            Axis::default()
                .bounds([lo, hi.max(lo + 0.1)])
                .labels(vec!["20", "200", "2k", "20k"])
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([FLOOR_DB, top.max(0.0) + 10.0])
                .labels(vec!["-100", "-60", "-20", "0"])
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}
