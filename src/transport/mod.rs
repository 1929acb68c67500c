//! Line-oriented byte-stream channels to an instrument.
//!
//! Both instrument families speak the same request/reply SCPI dialect; only
//! the channel differs. A [`Transport`] moves one `\n` terminated line at a
//! time and never pipelines: the caller reads the answer to a query before
//! writing the next command.

use crate::error::DmmError;

pub mod mock;
pub mod tcp;
pub mod visa;

pub use mock::MockTransport;
pub use tcp::{TcpTransport, DEFAULT_SCPI_PORT};
pub use visa::{select_usb_resource, VisaTransport};

pub trait Transport: Send {
    /// Write `line` followed by the line terminator
    fn write_line(&mut self, line: &str) -> Result<(), DmmError>;

    /// Block until one full line arrives; the terminator is included
    fn read_line(&mut self) -> Result<String, DmmError>;

    /// Release the underlying channel
    fn close(&mut self) -> Result<(), DmmError>;

    /// Human readable peer, for logs
    fn peer(&self) -> String;
}
