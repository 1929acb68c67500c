use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::io::Write;
use textplots::{Chart, Plot, Shape};

/// textplots refuses charts narrower than this
const MIN_CHART_WIDTH: u32 = 32;
const MIN_CHART_HEIGHT: u32 = 3;

/// Determine the best scale and unit for a given maximum value
fn determine_scale(max_value: f64) -> (f64, &'static str) {
    if max_value >= 1.0 {
        (1.0, "")
    } else if max_value >= 1e-3 {
        (1e3, "m")
    } else if max_value >= 1e-6 {
        (1e6, "μ")
    } else if max_value >= 1e-9 {
        (1e9, "n")
    } else {
        (1e12, "p")
    }
}

/// Symmetric log: linear through zero, logarithmic for large magnitudes
fn symlog(value: f64) -> f64 {
    value.signum() * (1.0 + value.abs()).log10()
}

fn value_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Plot a slice of readings against sample index with automatic SI scaling
///
/// # Examples
/// ```
/// use rusty_dmm::plotting::plot_values;
///
/// let data = vec![1e-3, 2e-3, 1.5e-3, 3e-3];
/// plot_values(&data, Some("Current"), None, None).unwrap();
/// ```
pub fn plot_values(
    values: &[f64],
    title: Option<&str>,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    if values.is_empty() {
        return Err("Cannot plot empty data".into());
    }

    let width = width.unwrap_or(140).max(MIN_CHART_WIDTH);
    let height = height.unwrap_or(60).max(MIN_CHART_HEIGHT);

    let (min_value, max_value) = value_bounds(values.iter().copied());
    let (value_scale, value_unit) = determine_scale(max_value.abs().max(min_value.abs()));

    let frame: Vec<(f32, f32)> = values
        .iter()
        .enumerate()
        .map(|(i, &value)| (i as f32, (value * value_scale) as f32))
        .collect();

    let max_index = ((values.len() - 1) as f32).max(1.0);

    println!("{}", title.unwrap_or("Readings"));
    println!(
        "{} samples | {:.3} to {:.3} {}units",
        values.len(),
        min_value * value_scale,
        max_value * value_scale,
        value_unit
    );

    Chart::new(width, height, 0.0, max_index)
        .lineplot(&Shape::Lines(&frame))
        .nice();

    Ok(())
}

/// Rolling time series redrawn in the terminal after every reading
#[derive(Debug, Clone)]
pub struct LivePlot {
    title: String,
    samples: VecDeque<(DateTime<Local>, f64)>,
    window: usize,
    width: u32,
    height: u32,
    log_scale: bool,
}

impl LivePlot {
    pub fn new(title: impl Into<String>, window: usize, width: u32, height: u32) -> Self {
        let window = window.max(1);
        Self {
            title: title.into(),
            samples: VecDeque::with_capacity(window + 1),
            window,
            width: width.max(MIN_CHART_WIDTH),
            height: height.max(MIN_CHART_HEIGHT),
            log_scale: false,
        }
    }

    /// Use a symmetric logarithmic y axis
    pub fn log_scale(mut self, enabled: bool) -> Self {
        self.log_scale = enabled;
        self
    }

    /// Append a reading, dropping the oldest once the window is full
    pub fn push(&mut self, timestamp: DateTime<Local>, value: f64) {
        self.samples.push_back((timestamp, value));
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().map(|(_, v)| *v)
    }

    /// SI scale for the values currently in the window
    fn scale(&self) -> (f64, &'static str) {
        let (lo, hi) = value_bounds(self.samples.iter().map(|(_, v)| *v));
        determine_scale(lo.abs().max(hi.abs()))
    }

    /// Chart points as (seconds since oldest sample, scaled value) and the
    /// SI prefix applied to the values
    pub fn points(&self) -> (Vec<(f32, f32)>, &'static str) {
        let Some((origin, _)) = self.samples.front() else {
            return (Vec::new(), "");
        };
        let (scale, unit) = self.scale();

        let points = self
            .samples
            .iter()
            .map(|(t, v)| {
                let micros = (*t - *origin).num_microseconds().unwrap_or(i64::MAX);
                let scaled = v * scale;
                let y = if self.log_scale { symlog(scaled) } else { scaled };
                ((micros as f64 / 1e6) as f32, y as f32)
            })
            .collect();
        (points, unit)
    }

    /// Clear the terminal and draw the current window
    pub fn render(&self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(latest) = self.latest() else {
            return Ok(());
        };
        let (points, unit) = self.points();
        let (scale, _) = self.scale();
        let x_max = points.iter().map(|(x, _)| *x).fold(1.0_f32, f32::max);

        {
            let mut stdout = std::io::stdout().lock();
            write!(stdout, "\x1B[2J\x1B[H")?;
            writeln!(stdout, "{}", self.title)?;
            writeln!(
                stdout,
                "{} samples | latest {:.4} {}units | y: {}{}units, x: seconds",
                points.len(),
                latest * scale,
                unit,
                if self.log_scale { "symlog " } else { "" },
                unit
            )?;
            stdout.flush()?;
        }

        Chart::new(self.width, self.height, 0.0, x_max)
            .lineplot(&Shape::Lines(&points))
            .nice();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_determine_scale() {
        assert_eq!(determine_scale(5.0), (1.0, ""));
        assert_eq!(determine_scale(0.005), (1e3, "m"));
        assert_eq!(determine_scale(5e-6), (1e6, "μ"));
        assert_eq!(determine_scale(5e-9), (1e9, "n"));
        assert_eq!(determine_scale(5e-12), (1e12, "p"));
    }

    #[test]
    fn test_symlog_is_odd() {
        assert_eq!(symlog(0.0), 0.0);
        assert!((symlog(9.0) - 1.0).abs() < 1e-12);
        assert!((symlog(-99.0) + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_plot_values_basic() {
        let data = vec![1.0, 2.0, 3.0, 2.0, 1.0];
        assert!(plot_values(&data, Some("Test Plot"), None, None).is_ok());
    }

    #[test]
    fn test_plot_empty_data() {
        let data: Vec<f64> = vec![];
        assert!(plot_values(&data, None, None, None).is_err());
    }

    #[test]
    fn test_live_plot_rolls_window() {
        let start = Local::now();
        let mut plot = LivePlot::new("current_dc", 3, 80, 20);
        for i in 0..5 {
            plot.push(start + Duration::milliseconds(500 * i), i as f64 * 1e-3);
        }
        assert_eq!(plot.len(), 3);
        assert!((plot.latest().unwrap() - 4e-3).abs() < 1e-12);

        let (points, unit) = plot.points();
        assert_eq!(unit, "m");
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].0, 0.0);
        assert!((points[0].1 - 2.0).abs() < 1e-4);
        assert!((points[2].0 - 1.0).abs() < 1e-6);
        assert!((points[2].1 - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_live_plot_log_scale() {
        let start = Local::now();
        let mut plot = LivePlot::new("volts", 10, 80, 20).log_scale(true);
        plot.push(start, 9.0);
        plot.push(start + Duration::seconds(1), -99.0);
        let (points, unit) = plot.points();
        assert_eq!(unit, "");
        assert!((points[0].1 - 1.0).abs() < 1e-6);
        assert!((points[1].1 + 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_live_plot_render() {
        let start = Local::now();
        let mut plot = LivePlot::new("resistance", 10, 64, 16);
        assert!(plot.render().is_ok());
        plot.push(start, 100.0);
        plot.push(start + Duration::seconds(1), 120.0);
        plot.push(start + Duration::seconds(2), 90.0);
        assert!(plot.render().is_ok());
    }
}
