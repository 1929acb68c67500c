use clap::{CommandFactory, FromArgMatches};
use log::{error, info};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rusty_dmm::cli::{
    capability_help, initialize_logging, run_actions, setup_shutdown_handler, MeterArgs,
};
use rusty_dmm::config::load_config_or_default;
use rusty_dmm::{DmmClient, InstrumentFamily};

/// Siglent SDM3055 Digital Multimeter control
#[derive(clap::Parser, Debug)]
#[command(name = "sdm3055")]
#[command(about = "Siglent SDM3055 digital multimeter over TCP", long_about = None)]
struct Args {
    #[command(flatten)]
    meter: MeterArgs,

    /// IP address or host name of the meter
    #[arg(short, long, value_name = "ADDR")]
    ip: Option<String>,

    /// SCPI port
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of measurements to take
    #[arg(short, long = "meas", value_name = "N", default_value_t = 1)]
    measurements: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let help = capability_help(InstrumentFamily::SiglentSdm3055.capabilities());
    let matches = Args::command().after_help(help).get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    let config = load_config_or_default(args.meter.settings.as_deref());

    let log_level = args
        .meter
        .log_level
        .clone()
        .unwrap_or(config.logging.log_level.clone());
    initialize_logging(&log_level)?;

    let address = args.ip.as_deref().unwrap_or(&config.instrument.address);
    let port = args.port.unwrap_or(config.instrument.port);

    let mut dmm = DmmClient::builder()
        .family(InstrumentFamily::SiglentSdm3055)
        .address(address)
        .port(port)
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
