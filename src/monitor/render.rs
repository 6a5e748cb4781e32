//! Renderer seam and a terminal implementation.

use crate::api::CurrentDataResponse;
use crate::core::{DataSource, DerivedRecord, LivenessState, YRange};

/// Display surface driven by the poll loop.
pub trait Renderer {
    /// Refresh the value readouts and liveness line. Called every successful tick.
    fn update_values(&mut self, snapshot: &CurrentDataResponse, liveness: LivenessState, status: &str);

    /// Redraw the chart. Only called with a non-empty, changed buffer.
    fn draw_chart(&mut self, records: &[DerivedRecord], y_range: YRange, source: DataSource);
}

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One bar per record, scaled into `y_range`.
pub fn sparkline(records: &[DerivedRecord], y_range: YRange) -> String {
    let span = y_range.span();
    records
        .iter()
        .map(|r| {
            let level = if span > 0.0 {
                ((r.glucose - y_range.min) / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            BARS[(level * (BARS.len() - 1) as f64).round() as usize]
        })
        .collect()
}

/// Prints status lines and a sparkline chart to stdout.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    last_status: Option<String>,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for TerminalRenderer {
    fn update_values(&mut self, snapshot: &CurrentDataResponse, _liveness: LivenessState, status: &str) {
        let v = &snapshot.sensor_values;
        let line = format!(
            "[{}] {} | red {:.2} ir {:.2} temp {:.1}°C motion {:.2} | {} | {} points",
            snapshot.timestamp,
            snapshot.data_source,
            v.red_signal,
            v.ir_signal,
            v.temperature,
            v.motion,
            status,
            snapshot.data_count
        );
        if self.last_status.as_deref() != Some(line.as_str()) {
            println!("{line}");
            self.last_status = Some(line);
        }
    }

    fn draw_chart(&mut self, records: &[DerivedRecord], y_range: YRange, source: DataSource) {
        let latest = records.last().map(|r| r.glucose).unwrap_or_default();
        println!(
            "  {} {:>5.1} mg/dL  {} [{:.0}..{:.0}]",
            source,
            latest,
            sparkline(records, y_range),
            y_range.min,
            y_range.max
        );
    }
}
