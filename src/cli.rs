//! Pieces shared by the command line front-ends.

use clap::Args;
use env_logger::Env;
use log::{info, LevelFilter};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::capability::CapabilityTable;
use crate::client::DmmClient;
use crate::error::DmmError;
use crate::types::{Measurement, Mode};

/// Options common to every meter CLI
#[derive(Args, Debug, Clone, Default)]
pub struct MeterArgs {
    /// Configure the DMM mode (e.g. volts_dc, current_ac, resistance_4w)
    #[arg(short = 'c', long = "config", value_name = "MODE")]
    pub mode: Option<String>,

    /// Configure mode range (e.g. auto, 10, 200mv)
    #[arg(short, long)]
    pub range: Option<String>,

    /// Configure NPLC count
    #[arg(short, long)]
    pub nplc: Option<String>,

    /// Configure AC bandwidth filter
    #[arg(short, long)]
    pub bandwidth: Option<String>,

    /// Print instrument status as JSON
    #[arg(short, long)]
    pub status: bool,

    /// Reset the instrument
    #[arg(long)]
    pub reset: bool,

    /// Measure forever, pausing this many seconds between readings
    #[arg(short = 'l', long = "loopdelay", value_name = "SECS", default_value_t = 0.0)]
    pub loop_delay: f64,

    /// Send a command directly to the DMM
    #[arg(long, value_name = "CMD")]
    pub raw: Option<String>,

    /// Log every line sent to and received from the instrument
    #[arg(short, long)]
    pub debug: bool,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Path to a configuration file
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,
}

/// Initialize logging with configurable level
pub fn initialize_logging(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let level = parse_level(log_level).unwrap_or_else(|| {
        eprintln!("Warning: Invalid log level '{}', using 'info'", log_level);
        LevelFilter::Info
    });

    env_logger::Builder::from_env(Env::default())
        .filter_level(level)
        .format_timestamp_millis()
        .try_init()?;

    Ok(())
}

fn parse_level(log_level: &str) -> Option<LevelFilter> {
    match log_level.to_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "trace" => Some(LevelFilter::Trace),
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        _ => None,
    }
}

/// Help footer listing what the meter accepts
pub fn capability_help(table: &CapabilityTable) -> String {
    format!(
        "{} modes: {}\nRanges: {}\nNPLC: {}",
        table.family,
        table.list_modes().join(", "),
        table.list_ranges().join(", "),
        table.list_nplcs().join(", ")
    )
}

/// Setup Ctrl+C handler for graceful shutdown
pub fn setup_shutdown_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_clone = shutdown_flag.clone();

    ctrlc::set_handler(move || {
        info!("Ctrl+C received - stopping...");
        shutdown_flag_clone.store(true, Ordering::SeqCst);
    })?;

    Ok(shutdown_flag)
}

/// Carry out the requested actions in a fixed order: reset, configure,
/// raw command, status, then loop or measure.
///
/// Mode, range, NPLC, bandwidth and loop delay are all checked before the
/// first command is written.
///
/// Results go to `out`: bare numbers for single readings, pretty JSON for
/// series and status.
pub fn run_actions<W: Write>(
    client: &mut DmmClient,
    args: &MeterArgs,
    measurements: u32,
    shutdown: &AtomicBool,
    out: &mut W,
) -> Result<(), DmmError> {
    let setup = match args.mode.as_deref() {
        Some(name) => {
            let mode: Mode = client.capabilities().describe_name(name)?.mode;
            Some(client.commands().configure_with_bandwidth(
                mode,
                args.range.as_deref(),
                args.nplc.as_deref(),
                args.bandwidth.as_deref(),
            )?)
        }
        None if args.range.is_some() || args.nplc.is_some() || args.bandwidth.is_some() => {
            return Err(DmmError::InvalidArgument(
                "--range, --nplc and --bandwidth need --config MODE".to_string(),
            ));
        }
        None => None,
    };
    let delay = loop_delay(args.loop_delay)?;

    if args.reset {
        client.reset()?;
    }

    if let Some(commands) = setup {
        client.send_all(&commands)?;
    }

    if let Some(command) = args.raw.as_deref() {
        if let Some(answer) = client.raw(command)? {
            writeln!(out, "{answer}").map_err(|e| DmmError::io(e, "Writing output"))?;
        }
    }

    if args.status {
        let status = client.status()?;
        print_json(out, &status)?;
    }

    if let Some(delay) = delay {
        measure_loop(client, delay, shutdown, out)?;
    } else if measurements > 0 {
        match client.read(measurements)? {
            Measurement::Single(value) => {
                writeln!(out, "{value}").map_err(|e| DmmError::io(e, "Writing output"))?
            }
            series => print_json(out, &series)?,
        }
    }

    Ok(())
}

/// Pause between loop readings; `None` when looping is off
fn loop_delay(secs: f64) -> Result<Option<Duration>, DmmError> {
    if secs.is_nan() || secs <= 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|e| DmmError::InvalidArgument(format!("loop delay {secs}: {e}")))
}

/// Measure, print, sleep until `shutdown` is raised
pub fn measure_loop<W: Write>(
    client: &mut DmmClient,
    delay: Duration,
    shutdown: &AtomicBool,
    out: &mut W,
) -> Result<(), DmmError> {
    while !shutdown.load(Ordering::SeqCst) {
        let value = client.measure()?;
        writeln!(out, "{value}").map_err(|e| DmmError::io(e, "Writing output"))?;
        out.flush().map_err(|e| DmmError::io(e, "Writing output"))?;
        std::thread::sleep(delay);
    }
    Ok(())
}

fn print_json<W: Write, T: serde::Serialize>(out: &mut W, value: &T) -> Result<(), DmmError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out).map_err(|e| DmmError::io(e, "Writing output"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use crate::types::InstrumentFamily;

    fn connect(family: InstrumentFamily) -> (DmmClient, MockTransport) {
        let mock = MockTransport::new();
        mock.push_response("+1");
        let client = DmmClient::with_transport(family, Box::new(mock.clone()), false).unwrap();
        mock.clear_written();
        (client, mock)
    }

    fn run(client: &mut DmmClient, args: &MeterArgs, measurements: u32) -> Result<String, DmmError> {
        let mut out = Vec::new();
        run_actions(client, args, measurements, &AtomicBool::new(false), &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_actions_run_in_order() {
        let (mut client, mock) = connect(InstrumentFamily::Keysight34460A);
        mock.push_response("\"KEYSIGHT TECHNOLOGIES,34460A\"")
            .push_response("1.25");
        let args = MeterArgs {
            reset: true,
            mode: Some("volts_dc".to_string()),
            range: Some("auto".to_string()),
            raw: Some("*IDN?".to_string()),
            ..Default::default()
        };

        let output = run(&mut client, &args, 1).unwrap();
        assert_eq!(output, "KEYSIGHT TECHNOLOGIES,34460A\n1.25\n");
        assert_eq!(
            mock.written(),
            vec![
                "*RST",
                "*CLS",
                "CONF:VOLT:DC",
                "VOLT:DC:RANG:AUTO ON",
                "*IDN?",
                "READ?"
            ]
        );
    }

    #[test]
    fn test_series_printed_as_json() {
        let (mut client, mock) = connect(InstrumentFamily::SiglentSdm3055);
        mock.push_response("1.0,2.5,-3.0");
        let output = run(&mut client, &MeterArgs::default(), 3).unwrap();
        assert_eq!(output, "[\n  1.0,\n  2.5,\n  -3.0\n]\n");
    }

    #[test]
    fn test_status_printed_as_json() {
        let (mut client, mock) = connect(InstrumentFamily::Keysight34460A);
        for answer in ["ID", "\"VOLT\"", "+1", "+0", "NEG", "IMM", "+1"] {
            mock.push_response(answer);
        }
        let args = MeterArgs {
            status: true,
            ..Default::default()
        };
        let output = run(&mut client, &args, 0).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["mode"], "VOLT");
        assert_eq!(parsed["trigger_source"], "IMM");
        assert!(output.starts_with("{\n  \"identity\": \"ID\""));
    }

    #[test]
    fn test_range_without_mode_rejected() {
        let (mut client, mock) = connect(InstrumentFamily::Keysight34460A);
        let args = MeterArgs {
            range: Some("10".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            run(&mut client, &args, 0),
            Err(DmmError::InvalidArgument(_))
        ));
        assert!(mock.written().is_empty());
    }

    #[test]
    fn test_unknown_mode_for_family() {
        let (mut client, _) = connect(InstrumentFamily::SiglentSdm3055);
        let args = MeterArgs {
            mode: Some("capacitance".to_string()),
            ..Default::default()
        };
        match run(&mut client, &args, 0) {
            Err(DmmError::UnknownMode { allowed, .. }) => assert!(!allowed.contains("capacitance")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_rejected_bandwidth_writes_nothing() {
        let (mut client, mock) = connect(InstrumentFamily::Keysight34460A);
        let args = MeterArgs {
            reset: true,
            mode: Some("volts_dc".to_string()),
            bandwidth: Some("20".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            run(&mut client, &args, 1),
            Err(DmmError::BandwidthUnsupported(_))
        ));

        let args = MeterArgs {
            mode: Some("volts_ac".to_string()),
            bandwidth: Some("50".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            run(&mut client, &args, 1),
            Err(DmmError::InvalidBandwidth { .. })
        ));
        assert!(mock.written().is_empty());
    }

    #[test]
    fn test_bandwidth_follows_configure() {
        let (mut client, mock) = connect(InstrumentFamily::Keysight34460A);
        let args = MeterArgs {
            mode: Some("current_ac".to_string()),
            range: Some("1".to_string()),
            bandwidth: Some("3".to_string()),
            ..Default::default()
        };
        run(&mut client, &args, 0).unwrap();
        assert_eq!(
            mock.written(),
            vec!["CONF:CURR:AC", "CURR:AC:RANG 1", "CURR:AC:BAND 3"]
        );
    }

    #[test]
    fn test_unrepresentable_loop_delay_rejected() {
        let (mut client, mock) = connect(InstrumentFamily::Keysight34460A);
        for delay in [f64::INFINITY, 1e300] {
            let args = MeterArgs {
                reset: true,
                loop_delay: delay,
                ..Default::default()
            };
            assert!(matches!(
                run(&mut client, &args, 1),
                Err(DmmError::InvalidArgument(_))
            ));
        }
        assert!(mock.written().is_empty());
    }

    #[test]
    fn test_loop_delay_off_when_not_positive() {
        assert_eq!(loop_delay(0.0).unwrap(), None);
        assert_eq!(loop_delay(-1.0).unwrap(), None);
        assert_eq!(loop_delay(f64::NAN).unwrap(), None);
        assert_eq!(loop_delay(0.5).unwrap(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_loop_stops_when_flag_raised() {
        let (mut client, mock) = connect(InstrumentFamily::Keysight34460A);
        let shutdown = AtomicBool::new(true);
        let mut out = Vec::new();
        measure_loop(&mut client, Duration::from_millis(1), &shutdown, &mut out).unwrap();
        assert!(out.is_empty());
        assert!(mock.written().is_empty());
    }

    #[test]
    fn test_loop_propagates_read_failure() {
        let (mut client, mock) = connect(InstrumentFamily::Keysight34460A);
        mock.push_response("1.0").push_response("2.0");
        let shutdown = AtomicBool::new(false);
        let mut out = Vec::new();
        let result = measure_loop(&mut client, Duration::from_millis(1), &shutdown, &mut out);
        assert!(matches!(result, Err(DmmError::Timeout)));
        assert_eq!(String::from_utf8(out).unwrap(), "1\n2\n");
    }

    #[test]
    fn test_capability_help_lists_tokens() {
        let help = capability_help(InstrumentFamily::SiglentSdm3055.capabilities());
        assert!(help.starts_with("Siglent SDM3055 modes: continuity, current_ac"));
        assert!(help.contains("200mv"));
        assert!(help.contains("NPLC: def, max, min, 0.3, 1, 10"));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Some(LevelFilter::Debug));
        assert_eq!(parse_level("loud"), None);
    }
}
