use chrono::Local;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rusty_dmm::cli::{initialize_logging, setup_shutdown_handler};
use rusty_dmm::config::load_config_or_default;
use rusty_dmm::{DmmClient, DmmError, InstrumentFamily, LivePlot, SampleRecorder};

/// Live terminal plot of SDM3055 readings
#[derive(Parser, Debug)]
#[command(name = "dmm-plot")]
#[command(about = "Live terminal plot of Siglent SDM3055 readings", long_about = None)]
struct Args {
    /// IP address or host name of the meter
    #[arg(short, long, value_name = "ADDR")]
    address: Option<String>,

    /// Measurement mode
    #[arg(short, long, default_value = "current_dc")]
    mode: String,

    /// Measurement range
    #[arg(short, long, default_value = "auto")]
    range: String,

    /// Integration time in power line cycles
    #[arg(short, long, default_value = "10")]
    nplc: String,

    /// Number of samples kept in the rolling window
    #[arg(short, long, value_name = "SAMPLES")]
    width: Option<usize>,

    /// Symmetric logarithmic y axis
    #[arg(short, long)]
    log: bool,

    /// Append `timestamp,value` lines to this file
    #[arg(short, long, value_name = "FILE")]
    save: Option<PathBuf>,

    /// Log every line sent to and received from the instrument
    #[arg(short, long)]
    debug: bool,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Path to a configuration file
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config_or_default(args.settings.as_deref());

    let log_level = args
        .log_level
        .clone()
        .unwrap_or(config.logging.log_level.clone());
    initialize_logging(&log_level)?;

    let address = args.address.as_deref().unwrap_or(&config.instrument.address);
    let mut dmm = DmmClient::builder()
        .family(InstrumentFamily::SiglentSdm3055)
        .address(address)
        .port(config.instrument.port)
        .config(config.instrument.connection())
        .debug(args.debug)
        .build()?;

    let mode = dmm.capabilities().describe_name(&args.mode)?.mode;
    dmm.configure(mode, Some(&args.range), Some(&args.nplc))?;

    let window = args.width.unwrap_or(config.plot.window);
    let mut plot = LivePlot::new(
        format!("{mode} ({}, range {}, nplc {})", address, args.range, args.nplc),
        window,
        config.plot.chart_width,
        config.plot.chart_height,
    )
    .log_scale(args.log);

    let mut recorder = args.save.as_ref().map(|path| {
        info!("Saving readings to {}", path.display());
        SampleRecorder::new(path, 1)
    });

    let shutdown = setup_shutdown_handler()?;
    let interval = Duration::from_millis(config.plot.interval_ms);

    let result = plot_loop(&mut dmm, &mut plot, recorder.as_mut(), &shutdown, interval);

    if let Err(e) = &result {
        error!("{e}");
    }
    if let Some(mut recorder) = recorder {
        recorder.flush()?;
    }
    dmm.close()?;
    info!("Stopped after {} samples in window", plot.len());
    result
}

/// Measure, record and redraw until Ctrl+C
fn plot_loop(
    dmm: &mut DmmClient,
    plot: &mut LivePlot,
    mut recorder: Option<&mut SampleRecorder>,
    shutdown: &AtomicBool,
    interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    while !shutdown.load(Ordering::SeqCst) {
        let value = match dmm.measure() {
            Ok(value) => value,
            // Ctrl+C can land while a read is pending
            Err(DmmError::Timeout) if shutdown.load(Ordering::SeqCst) => break,
            Err(e) => return Err(e.into()),
        };
        let now = Local::now();

        plot.push(now, value);
        if let Some(recorder) = recorder.as_deref_mut() {
            recorder.add(now, value)?;
        }
        plot.render()?;
        std::thread::sleep(interval);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_arguments_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_short_log_flag() {
        let args = Args::try_parse_from(["dmm-plot", "-l", "-a", "10.0.0.7"]).unwrap();
        assert!(args.log);
        assert_eq!(args.address.as_deref(), Some("10.0.0.7"));
        assert_eq!(args.mode, "current_dc");
        assert_eq!(args.range, "auto");
        assert_eq!(args.nplc, "10");
    }
}
