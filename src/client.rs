use log::{debug, info, log, Level};
use std::time::Duration;

use crate::capability::CapabilityTable;
use crate::commands::{CommandBuilder, READ_QUERY, SAMPLE_COUNT_QUERY};
use crate::error::DmmError;
use crate::protocol::Protocol;
use crate::transport::{
    select_usb_resource, TcpTransport, Transport, VisaTransport, DEFAULT_SCPI_PORT,
};
use crate::types::{InstrumentFamily, Measurement, Mode, StatusRecord};

/// Connection configuration shared by every transport.
///
/// The same read timeout applies to the socket and to the VISA session, so
/// a silent instrument ends in [`DmmError::Timeout`] on both.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rusty_dmm::ConnectionConfig;
///
/// let config = ConnectionConfig {
///     read_timeout: Duration::from_secs(30),
///     ..Default::default()
/// };
/// assert_eq!(config.connect_timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for opening the channel
    pub connect_timeout: Duration,
    /// Timeout for a single response line
    pub read_timeout: Duration,
    /// Timeout for writing one command
    pub write_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Builder for [`DmmClient`].
///
/// An address selects the TCP transport; otherwise the USB-VISA transport is
/// used, opening `resource` or auto-selecting a USB instrument.
///
/// ```no_run
/// use rusty_dmm::{DmmClient, InstrumentFamily};
///
/// let client = DmmClient::builder()
///     .family(InstrumentFamily::SiglentSdm3055)
///     .address("192.168.1.98")
///     .debug(true)
///     .build()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Default)]
pub struct DmmClientBuilder {
    family: Option<InstrumentFamily>,
    address: Option<String>,
    port: Option<u16>,
    resource: Option<String>,
    config: ConnectionConfig,
    debug: bool,
}

impl DmmClientBuilder {
    pub fn family(mut self, family: InstrumentFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn address(mut self, addr: &str) -> Self {
        self.address = Some(addr.to_string());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// VISA resource string; leave unset to auto-select a USB instrument
    pub fn resource(mut self, resource: Option<&str>) -> Self {
        self.resource = resource.map(str::to_string);
        self
    }

    /// Log every line sent and received at info level
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<DmmClient, DmmError> {
        let family = self.family.ok_or_else(|| {
            DmmError::InvalidArgument("Instrument family must be specified".to_string())
        })?;

        let transport: Box<dyn Transport> = match self.address {
            Some(address) => {
                let port = self.port.unwrap_or(DEFAULT_SCPI_PORT);
                debug!("Connecting to {family} at {address}:{port}");
                Box::new(TcpTransport::connect(&address, port, &self.config)?)
            }
            None => {
                let resource = match self.resource {
                    Some(resource) => resource,
                    None => {
                        let available = VisaTransport::list_resources()?;
                        select_usb_resource(&available, family.capabilities().discovery_hints)?
                    }
                };
                debug!("Opening {family} at {resource}");
                Box::new(VisaTransport::open(&resource, &self.config)?)
            }
        };

        DmmClient::with_transport(family, transport, self.debug)
    }
}

/// Session with one multimeter.
///
/// Owns the transport exclusively and talks strict request/reply: every
/// query is answered before the next command goes out. The sample count last
/// written to the meter is cached so single readings do not rewrite it.
///
/// # Examples
///
/// ```no_run
/// use rusty_dmm::{DmmClient, Mode};
///
/// let mut dmm = DmmClient::sdm3055("192.168.1.98")?;
/// dmm.configure(Mode::VoltsDc, Some("20v"), Some("10"))?;
/// let volts = dmm.measure()?;
/// let burst = dmm.measure_many(10)?;
/// println!("{volts} {burst:?}");
/// dmm.close()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct DmmClient {
    transport: Option<Box<dyn Transport>>,
    commands: CommandBuilder,
    sample_count: u32,
    debug: bool,
}

impl DmmClient {
    pub fn builder() -> DmmClientBuilder {
        DmmClientBuilder::default()
    }

    /// Siglent SDM3055 on the default SCPI port
    pub fn sdm3055(addr: &str) -> Result<Self, DmmError> {
        Self::builder()
            .family(InstrumentFamily::SiglentSdm3055)
            .address(addr)
            .build()
    }

    /// Keysight 34460A over USB-VISA; `None` auto-selects the instrument
    pub fn ks34460a(resource: Option<&str>) -> Result<Self, DmmError> {
        Self::builder()
            .family(InstrumentFamily::Keysight34460A)
            .resource(resource)
            .build()
    }

    /// Wrap an already open transport and read the current sample count
    pub fn with_transport(
        family: InstrumentFamily,
        transport: Box<dyn Transport>,
        debug: bool,
    ) -> Result<Self, DmmError> {
        let peer = transport.peer();
        let mut client = Self {
            transport: Some(transport),
            commands: CommandBuilder::new(family),
            sample_count: 0,
            debug,
        };
        let answer = client.query(SAMPLE_COUNT_QUERY)?;
        client.sample_count = Protocol::parse_count(&answer)?;
        info!(
            "Connected to {family} at {peer} (sample count {})",
            client.sample_count
        );
        Ok(client)
    }

    pub fn family(&self) -> InstrumentFamily {
        self.commands.table().family
    }

    pub fn capabilities(&self) -> &'static CapabilityTable {
        self.commands.table()
    }

    /// Command builder for this family, for validating requests up front
    pub fn commands(&self) -> &CommandBuilder {
        &self.commands
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Sample count last read from or written to the meter
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Select `mode`, optionally fixing its range and integration time.
    ///
    /// The whole request is validated against the capability table first;
    /// nothing is written when any part is rejected.
    pub fn configure(
        &mut self,
        mode: Mode,
        range: Option<&str>,
        nplc: Option<&str>,
    ) -> Result<(), DmmError> {
        let commands = self.commands.configure(mode, range, nplc)?;
        self.send_all(&commands)
    }

    /// Like [`configure`](Self::configure), also setting the AC bandwidth
    /// filter. A rejected bandwidth writes nothing either.
    pub fn configure_with_bandwidth(
        &mut self,
        mode: Mode,
        range: Option<&str>,
        nplc: Option<&str>,
        bandwidth: Option<&str>,
    ) -> Result<(), DmmError> {
        let commands = self
            .commands
            .configure_with_bandwidth(mode, range, nplc, bandwidth)?;
        self.send_all(&commands)
    }

    pub fn configure_bandwidth(&mut self, mode: Mode, bandwidth: &str) -> Result<(), DmmError> {
        let command = self.commands.bandwidth(mode, bandwidth)?;
        self.send_command(&command)
    }

    pub fn reset(&mut self) -> Result<(), DmmError> {
        let commands = self.commands.reset();
        self.send_all(&commands)
    }

    /// Trigger and read one value
    pub fn measure(&mut self) -> Result<f64, DmmError> {
        if self.sample_count != 1 {
            self.send_command(&self.commands.single_sample())?;
            self.sample_count = 1;
        }
        let answer = self.query(READ_QUERY)?;
        Protocol::parse_f64(&answer)
    }

    /// Take `count` readings with an immediate trigger, in acquisition order
    pub fn measure_many(&mut self, count: u32) -> Result<Vec<f64>, DmmError> {
        let setup = self.commands.multi_sample(count)?;
        self.ensure_open()?;
        self.send_command(&setup[0])?;
        self.sample_count = count;
        self.send_all(&setup[1..])?;

        let answer = self.query(READ_QUERY)?;
        let values = Protocol::parse_f64_list(&answer)?;
        if values.len() != count as usize {
            return Err(DmmError::Parse(format!(
                "expected {count} readings, got {}",
                values.len()
            )));
        }
        Ok(values)
    }

    /// One reading for `count == 1`, a series otherwise
    pub fn read(&mut self, count: u32) -> Result<Measurement, DmmError> {
        match count {
            0 => Err(DmmError::InvalidArgument(
                "at least one reading must be requested".to_string(),
            )),
            1 => self.measure().map(Measurement::Single),
            n => self.measure_many(n).map(Measurement::Series),
        }
    }

    /// Run every status query of the family in table order.
    ///
    /// The first failing query aborts the whole call.
    pub fn status(&mut self) -> Result<StatusRecord, DmmError> {
        let mut status = StatusRecord::new();
        for query in self.commands.table().status_queries {
            let answer = self.query(query.command)?;
            status.insert(query.name, answer);
        }
        Ok(status)
    }

    /// Pass a command straight through, bypassing the capability table.
    ///
    /// Commands containing `?` are queries and return the normalised answer.
    pub fn raw(&mut self, command: &str) -> Result<Option<String>, DmmError> {
        if Protocol::is_query(command) {
            self.query(command).map(Some)
        } else {
            self.send_command(command).map(|_| None)
        }
    }

    /// Write one command without reading anything back
    pub fn send_command(&mut self, command: &str) -> Result<(), DmmError> {
        let level = self.traffic_level();
        let transport = self.transport.as_mut().ok_or(DmmError::SessionClosed)?;
        log!(level, " >> {command}");
        transport.write_line(command)
    }

    /// Write a query and return its normalised one-line answer
    pub fn query(&mut self, command: &str) -> Result<String, DmmError> {
        self.send_command(command)?;
        let level = self.traffic_level();
        let transport = self.transport.as_mut().ok_or(DmmError::SessionClosed)?;
        let line = transport.read_line()?;
        log!(level, " << {}", line.trim_end());
        Ok(Protocol::normalize_response(&line).to_string())
    }

    /// Release the transport; later calls fail with [`DmmError::SessionClosed`]
    pub fn close(&mut self) -> Result<(), DmmError> {
        match self.transport.take() {
            Some(mut transport) => {
                debug!("Closing connection to {}", transport.peer());
                transport.close()
            }
            None => Ok(()),
        }
    }

    /// Write a prepared command list in order
    pub fn send_all(&mut self, commands: &[String]) -> Result<(), DmmError> {
        self.ensure_open()?;
        for command in commands {
            self.send_command(command)?;
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DmmError> {
        if self.transport.is_some() {
            Ok(())
        } else {
            Err(DmmError::SessionClosed)
        }
    }

    fn traffic_level(&self) -> Level {
        if self.debug { Level::Info } else { Level::Trace }
    }
}

impl Drop for DmmClient {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
