use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use log::{debug, warn};

use super::Transport;
use crate::client::ConnectionConfig;
use crate::error::DmmError;
use crate::protocol::LINE_TERMINATOR;

/// Raw SCPI socket port used by LAN instruments
pub const DEFAULT_SCPI_PORT: u16 = 5025;

/// SCPI over a plain TCP socket.
///
/// Commands go out as ASCII lines; responses are read through a buffered
/// reader, with invalid bytes replaced instead of failing the read.
pub struct TcpTransport {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    peer: SocketAddr,
}

impl TcpTransport {
    /// Connect to `host:port`, applying the timeouts from `config`.
    ///
    /// `host` may be an IP address or a resolvable host name.
    pub fn connect(host: &str, port: u16, config: &ConnectionConfig) -> Result<Self, DmmError> {
        let target = format!("{host}:{port}");
        let socket_addr = (host, port)
            .to_socket_addrs()
            .and_then(|mut addrs| {
                addrs.next().ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "host resolved to no addresses",
                    )
                })
            })
            .map_err(|e| {
                warn!("Failed to resolve {target}: {e}");
                DmmError::Connection {
                    target: target.clone(),
                    source: e,
                }
            })?;

        debug!("Connecting to {socket_addr}");

        let stream = TcpStream::connect_timeout(&socket_addr, config.connect_timeout)
            .map_err(|e| {
                warn!("Failed to connect to {target}: {e}");
                DmmError::Connection {
                    target: target.clone(),
                    source: e,
                }
            })?;

        stream
            .set_read_timeout(Some(config.read_timeout))
            .map_err(|e| DmmError::io(e, "Setting read timeout"))?;
        stream
            .set_write_timeout(Some(config.write_timeout))
            .map_err(|e| DmmError::io(e, "Setting write timeout"))?;
        stream
            .set_nodelay(true)
            .map_err(|e| DmmError::io(e, "Disabling Nagle"))?;

        let reader = BufReader::new(
            stream
                .try_clone()
                .map_err(|e| DmmError::io(e, "Cloning socket for reading"))?,
        );

        debug!("Connected to {socket_addr}");

        Ok(Self {
            stream,
            reader,
            peer: socket_addr,
        })
    }
}

impl Transport for TcpTransport {
    fn write_line(&mut self, line: &str) -> Result<(), DmmError> {
        if !line.is_ascii() {
            return Err(DmmError::InvalidArgument(format!(
                "command is not ASCII: {line:?}"
            )));
        }
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(LINE_TERMINATOR as u8);

        self.stream
            .write_all(&bytes)
            .map_err(|e| DmmError::io(e, format!("Writing '{line}'")))?;
        self.stream
            .flush()
            .map_err(|e| DmmError::io(e, "Flushing socket"))
    }

    fn read_line(&mut self) -> Result<String, DmmError> {
        let mut buf = Vec::new();
        let n = self
            .reader
            .read_until(LINE_TERMINATOR as u8, &mut buf)
            .map_err(|e| DmmError::io(e, "Reading response"))?;
        if n == 0 {
            return Err(DmmError::Io {
                source: std::io::ErrorKind::UnexpectedEof.into(),
                context: format!("{} closed the connection", self.peer),
            });
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn close(&mut self) -> Result<(), DmmError> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(DmmError::io(e, "Closing socket")),
        }
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}
