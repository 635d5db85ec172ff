use std::{path::Path, time::Duration};

use chrono::{DateTime, Local, TimeDelta};
use eyre::{Result, ensure, eyre};
use plotters::{coord::Shift, prelude::*};

use crate::protocol::Echo;

/* == Definitions == */

#[derive(Clone, Debug, PartialEq)]
pub struct PendingSend {
    pub message: String,
    pub sent_at: DateTime<Local>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LatencySample {
    pub sent_at: DateTime<Local>,
    pub received_at: DateTime<Local>,
    /// Processing time reported by the board.
    pub latency: Duration,
}

/// Messages in flight and the latency history of a console session.
/// Owned by a single task; the serial reader only hands it decoded echoes.
#[derive(Debug, Default)]
pub struct LatencyLog {
    pending: Vec<PendingSend>,
    samples: Vec<LatencySample>,
}

/* == Implementations == */

impl LatencyLog {
    pub const MIN_PLOT_SAMPLES: usize = 2;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[PendingSend] {
        &self.pending
    }

    pub fn samples(&self) -> &[LatencySample] {
        &self.samples
    }

    pub fn record_send(&mut self, message: &str, sent_at: DateTime<Local>) {
        self.pending.push(PendingSend {
            message: message.to_owned(),
            sent_at,
        });
    }

    /// Records the latency of an echoed message, retiring the oldest pending
    /// send with identical text. Echoes without a pending send are still
    /// sampled, with the send time inferred from the reported latency.
    pub fn record_echo(&mut self, echo: &Echo, received_at: DateTime<Local>) -> &LatencySample {
        let latency = echo.latency();

        let sent_at = match self.pending.iter().position(|p| p.message == echo.message) {
            Some(i) => self.pending.remove(i).sent_at,
            None => {
                tracing::warn!("Echo \"{}\" does not match a pending message", echo.message);
                TimeDelta::from_std(latency)
                    .ok()
                    .and_then(|delta| received_at.checked_sub_signed(delta))
                    .unwrap_or(received_at)
            }
        };

        self.samples.push(LatencySample {
            sent_at,
            received_at,
            latency,
        });

        &self.samples[self.samples.len() - 1]
    }

    /// Renders absolute send/receive times and per-message delays to a PNG.
    pub fn render_plot(&self, path: &Path) -> Result<()> {
        ensure!(
            self.samples.len() >= Self::MIN_PLOT_SAMPLES,
            "Not enough samples to plot ({} of {})",
            self.samples.len(),
            Self::MIN_PLOT_SAMPLES
        );

        let origin = self.samples[0].sent_at;
        let seconds = |t: DateTime<Local>| (t - origin).num_milliseconds() as f32 / 1000.;

        let times: Vec<(f32, f32)> = self
            .samples
            .iter()
            .map(|s| (seconds(s.sent_at), seconds(s.received_at)))
            .collect();

        let delays: Vec<(f32, f32)> = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, s)| (i as f32, s.latency.as_secs_f32()))
            .collect();

        let root = BitMapBackend::new(path, (1800, 800)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| eyre!("Failed to fill plot {e}"))?;

        let (left, right) = root.split_horizontally(900);

        draw_series(&left, &times, "Absolute times", ("Send time [s]", "Receive time [s]"))?;
        draw_series(&right, &delays, "Delays", ("Message", "Delay [s]"))?;

        root.present()
            .map_err(|e| eyre!("Failed to write {}: {e}", path.display()))?;

        tracing::info!("Saved latency plot to {}", path.display());

        Ok(())
    }
}

/* == Plotting == */

fn draw_series<T>(
    area: &DrawingArea<T, Shift>,
    data: &[(f32, f32)],
    chart_name: &str,
    (x_name, y_name): (&str, &str),
) -> Result<()>
where
    T: DrawingBackend,
{
    let (x_range, y_range) = bounds(data);

    let mut chart = ChartBuilder::on(area)
        .caption(chart_name, ("sans-serif", 24))
        .margin(24)
        .x_label_area_size(64)
        .y_label_area_size(64)
        .build_cartesian_2d(x_range, y_range)
        .map_err(|e| eyre!("Failed to build chart {e}"))?;

    chart
        .configure_mesh()
        .x_desc(x_name)
        .y_desc(y_name)
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .draw()
        .map_err(|e| eyre!("Failed to draw chart {e}"))?;

    chart
        .draw_series(LineSeries::new(data.iter().copied(), LINE_COLOUR.stroke_width(2)))
        .map_err(|e| eyre!("Failed to draw series {e}"))?;

    chart
        .draw_series(
            data.iter()
                .map(|&coords| Circle::new(coords, 4, LINE_COLOUR.filled())),
        )
        .map_err(|e| eyre!("Failed to draw series {e}"))?;

    Ok(())
}

const LINE_COLOUR: RGBColor = RGBColor(149, 81, 150);

/// Axis ranges covering every point, widened when all values coincide.
fn bounds(data: &[(f32, f32)]) -> (std::ops::Range<f32>, std::ops::Range<f32>) {
    let mut x = (f32::INFINITY, f32::NEG_INFINITY);
    let mut y = (f32::INFINITY, f32::NEG_INFINITY);

    for &(px, py) in data {
        x = (x.0.min(px), x.1.max(px));
        y = (y.0.min(py), y.1.max(py));
    }

    let widen = |(min, max): (f32, f32)| {
        if max > min { min..max } else { min - 0.5..max + 0.5 }
    };

    (widen(x), widen(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(message: &str, time_ms: f64) -> Echo {
        Echo {
            message: message.to_owned(),
            time_ms,
        }
    }

    #[test]
    fn test_echo_retires_pending_send() {
        let mut log = LatencyLog::new();
        let sent_at = Local::now();

        log.record_send("hello", sent_at);
        log.record_send("world", sent_at);

        let sample = log.record_echo(&echo("hello", 250.), sent_at + TimeDelta::seconds(1));

        assert_eq!(sample.latency, Duration::from_millis(250));
        assert_eq!(sample.sent_at, sent_at);

        assert_eq!(log.samples().len(), 1);
        assert_eq!(log.pending().len(), 1);
        assert_eq!(log.pending()[0].message, "world");
    }

    #[test]
    fn test_duplicate_pending_retires_oldest() {
        let mut log = LatencyLog::new();
        let first = Local::now();
        let second = first + TimeDelta::milliseconds(10);

        log.record_send("ping", first);
        log.record_send("ping", second);
        log.record_echo(&echo("ping", 5.), second);

        assert_eq!(log.pending(), [PendingSend {
            message: "ping".to_owned(),
            sent_at: second
        }]);
    }

    #[test]
    fn test_unmatched_echo_is_sampled() {
        let mut log = LatencyLog::new();
        let received_at = Local::now();

        let sample = log.record_echo(&echo("stray", 500.), received_at);

        assert_eq!(sample.sent_at, received_at - TimeDelta::milliseconds(500));
        assert!(log.pending().is_empty());
    }

    #[test]
    fn test_huge_unmatched_latency_keeps_receive_time() {
        let mut log = LatencyLog::new();
        let received_at = Local::now();

        let sample = log.record_echo(&echo("stray", 1e17), received_at);

        assert_eq!(sample.sent_at, received_at);
        assert_eq!(log.samples().len(), 1);
    }

    #[test]
    fn test_plot_requires_samples() {
        let mut log = LatencyLog::new();
        log.record_echo(&echo("one", 1.), Local::now());

        assert!(log.render_plot(Path::new("unused.png")).is_err());
    }

    #[test]
    fn test_bounds() {
        let (x, y) = bounds(&[(0., 1.), (2., 1.)]);

        assert_eq!(x, 0.0..2.0);
        assert_eq!(y, 0.5..1.5);
    }
}
