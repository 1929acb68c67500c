use clap::{CommandFactory, FromArgMatches};
use log::{error, info};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rusty_dmm::cli::{
    capability_help, initialize_logging, run_actions, setup_shutdown_handler, MeterArgs,
};
use rusty_dmm::config::load_config_or_default;
use rusty_dmm::{DmmClient, InstrumentFamily, VisaTransport};

/// Keysight 34460A Digital Multimeter control
#[derive(clap::Parser, Debug)]
#[command(name = "ks34460a")]
#[command(about = "Keysight 34460A digital multimeter over USB-VISA", long_about = None)]
struct Args {
    #[command(flatten)]
    meter: MeterArgs,

    /// VISA resource string (auto-detects a USB instrument when omitted)
    #[arg(short = 'u', long, value_name = "RESOURCE")]
    resource: Option<String>,

    /// List available VISA resources and exit
    #[arg(short = 'L', long)]
    list: bool,

    /// Number of measurements to take
    #[arg(short, long = "meas", value_name = "N", default_value_t = 0)]
    measurements: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let help = capability_help(InstrumentFamily::Keysight34460A.capabilities());
    let matches = Args::command().after_help(help).get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    let config = load_config_or_default(args.meter.settings.as_deref());

    let log_level = args
        .meter
        .log_level
        .clone()
        .unwrap_or(config.logging.log_level.clone());
    initialize_logging(&log_level)?;

    if args.list {
        let resources = VisaTransport::list_resources()?;
        if resources.is_empty() {
            println!("No VISA resources found");
        }
        for resource in resources {
            println!("{resource}");
        }
        return Ok(());
    }

    let resource = args
        .resource
        .as_deref()
        .or_else(|| config.instrument.resource());

    let mut dmm = DmmClient::builder()
        .family(InstrumentFamily::Keysight34460A)
        .resource(resource)
        .config(config.instrument.connection())
        .debug(args.meter.debug)
        .build()?;

    let shutdown = if args.meter.loop_delay > 0.0 {
        setup_shutdown_handler()?
    } else {
        Arc::new(AtomicBool::new(false))
    };

    let mut stdout = std::io::stdout().lock();
    let result = run_actions(&mut dmm, &args.meter, args.measurements, &shutdown, &mut stdout);
    if let Err(e) = &result {
        error!("{e}");
    }

    dmm.close()?;
    info!("Connection closed");
    result.map_err(Into::into)
}
