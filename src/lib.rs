pub mod capability;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod plotting;
pub mod protocol;
pub mod recorder;
pub mod transport;
pub mod types;

pub use capability::{CapabilityTable, ModeDescriptor, StatusQuery};
pub use client::{ConnectionConfig, DmmClient, DmmClientBuilder};
pub use commands::CommandBuilder;
pub use error::DmmError;
pub use plotting::{plot_values, LivePlot};
pub use protocol::Protocol;
pub use recorder::SampleRecorder;
pub use transport::{MockTransport, TcpTransport, Transport, VisaTransport};
pub use types::{InstrumentFamily, Measurement, Mode, StatusRecord};
