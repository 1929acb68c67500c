//! USB-VISA transport.
//!
//! The session itself needs a VISA library at link time and is only built
//! with the `visa` feature. Resource selection is plain string filtering and
//! is always available.

use log::info;

use crate::error::DmmError;

/// Pick the instrument to open from a VISA resource list.
///
/// Only USB resources are considered. The first one whose identifier
/// contains one of `hints` (case-insensitive) wins, otherwise the first USB
/// resource is taken.
pub fn select_usb_resource(resources: &[String], hints: &[&str]) -> Result<String, DmmError> {
    let usb: Vec<&String> = resources
        .iter()
        .filter(|r| r.to_uppercase().contains("USB"))
        .collect();

    let first = usb
        .first()
        .ok_or_else(|| DmmError::NoInstrumentFound(resources.to_vec()))?;

    let chosen = usb
        .iter()
        .find(|r| {
            let upper = r.to_uppercase();
            hints.iter().any(|hint| upper.contains(&hint.to_uppercase()))
        })
        .unwrap_or(first);

    info!("Auto-selected: {chosen}");
    Ok((*chosen).clone())
}

#[cfg(feature = "visa")]
mod session {
    use std::ffi::CString;
    use std::io::{Read, Write};

    use log::debug;
    use visa_rs::prelude::*;

    use crate::client::ConnectionConfig;
    use crate::error::DmmError;
    use crate::protocol::LINE_TERMINATOR;
    use crate::transport::Transport;

    const ALL_INSTRUMENTS: &str = "?*INSTR";

    fn visa_err(e: impl std::fmt::Debug) -> DmmError {
        DmmError::Visa(format!("{e:?}"))
    }

    /// Open session to a VISA resource such as `USB0::0x2A8D::0x1301::MY5...::INSTR`
    pub struct VisaTransport {
        instrument: Instrument,
        // dropped after `instrument`, closing the resource manager last
        _rm: DefaultRM,
        resource: String,
        pending: Vec<u8>,
    }

    impl VisaTransport {
        pub fn list_resources() -> Result<Vec<String>, DmmError> {
            let rm = DefaultRM::new().map_err(visa_err)?;
            let expr = CString::new(ALL_INSTRUMENTS)
                .map_err(|e| DmmError::InvalidArgument(e.to_string()))?;
            let mut list = match rm.find_res_list(&expr.into()) {
                Ok(list) => list,
                // VISA reports "nothing found" as an error status
                Err(e) => {
                    debug!("Resource search returned {e:?}");
                    return Ok(Vec::new());
                }
            };
            let mut resources = Vec::new();
            while let Some(resource) = list.find_next().map_err(visa_err)? {
                resources.push(resource.to_string());
            }
            Ok(resources)
        }

        pub fn open(resource: &str, config: &ConnectionConfig) -> Result<Self, DmmError> {
            let connection_error = |e: &dyn std::fmt::Debug| DmmError::Connection {
                target: resource.to_string(),
                source: std::io::Error::other(format!("{e:?}")),
            };

            let rm = DefaultRM::new().map_err(|e| connection_error(&e))?;
            let name = CString::new(resource)
                .map_err(|_| DmmError::InvalidAddress(resource.to_string()))?;
            let instrument = rm
                .open(&name.into(), AccessMode::NO_LOCK, config.connect_timeout)
                .map_err(|e| connection_error(&e))?;

            let timeout_ms = u32::try_from(config.read_timeout.as_millis()).unwrap_or(u32::MAX);
            if let Some(attr) = attribute::AttrTmoValue::new_checked(timeout_ms) {
                instrument.set_attr(attr).map_err(|e| connection_error(&e))?;
            }

            debug!("Opened VISA resource {resource}");
            Ok(Self {
                instrument,
                _rm: rm,
                resource: resource.to_string(),
                pending: Vec::new(),
            })
        }
    }

    impl Transport for VisaTransport {
        fn write_line(&mut self, line: &str) -> Result<(), DmmError> {
            let mut bytes = line.as_bytes().to_vec();
            bytes.push(LINE_TERMINATOR as u8);
            self.instrument
                .write_all(&bytes)
                .map_err(|e| DmmError::io(e, format!("Writing '{line}'")))
        }

        fn read_line(&mut self) -> Result<String, DmmError> {
            let terminator = LINE_TERMINATOR as u8;
            let mut chunk = [0u8; 512];
            loop {
                if let Some(pos) = self.pending.iter().position(|b| *b == terminator) {
                    let line: Vec<u8> = self.pending.drain(..=pos).collect();
                    return Ok(String::from_utf8_lossy(&line).into_owned());
                }
                let n = self
                    .instrument
                    .read(&mut chunk)
                    .map_err(|e| DmmError::io(e, "Reading response"))?;
                if n == 0 {
                    // end of message without terminator
                    let line = std::mem::take(&mut self.pending);
                    return Ok(String::from_utf8_lossy(&line).into_owned());
                }
                self.pending.extend_from_slice(&chunk[..n]);
            }
        }

        fn close(&mut self) -> Result<(), DmmError> {
            self.pending.clear();
            Ok(())
        }

        fn peer(&self) -> String {
            self.resource.clone()
        }
    }
}

#[cfg(not(feature = "visa"))]
mod session {
    use crate::client::ConnectionConfig;
    use crate::error::DmmError;
    use crate::transport::Transport;

    fn disabled() -> DmmError {
        DmmError::Visa("built without the `visa` feature".to_string())
    }

    /// Placeholder when the crate is built without VISA support
    pub struct VisaTransport {
        _private: (),
    }

    impl VisaTransport {
        pub fn list_resources() -> Result<Vec<String>, DmmError> {
            Err(disabled())
        }

        pub fn open(_resource: &str, _config: &ConnectionConfig) -> Result<Self, DmmError> {
            Err(disabled())
        }
    }

    impl Transport for VisaTransport {
        fn write_line(&mut self, _line: &str) -> Result<(), DmmError> {
            Err(disabled())
        }

        fn read_line(&mut self) -> Result<String, DmmError> {
            Err(disabled())
        }

        fn close(&mut self) -> Result<(), DmmError> {
            Ok(())
        }

        fn peer(&self) -> String {
            "visa (disabled)".to_string()
        }
    }
}

pub use session::VisaTransport;
