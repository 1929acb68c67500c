//! Scripted in-memory transport for exercising a session without hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::Transport;
use crate::error::DmmError;

#[derive(Debug, Default)]
struct MockState {
    written: Vec<String>,
    responses: VecDeque<String>,
    closed: bool,
}

/// Records every written line and replays queued responses in order.
///
/// Clones share state, so a test can keep one handle for inspection and hand
/// another to the client. Reading with nothing queued behaves like a silent
/// instrument and yields [`DmmError::Timeout`].
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response line; a terminator is appended when missing
    pub fn push_response(&self, line: &str) -> &Self {
        let mut line = line.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        self.lock().responses.push_back(line);
        self
    }

    /// Lines written so far, without terminators
    pub fn written(&self) -> Vec<String> {
        self.lock().written.clone()
    }

    pub fn clear_written(&self) {
        self.lock().written.clear();
    }

    pub fn pending_responses(&self) -> usize {
        self.lock().responses.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // recorded traffic stays readable after a poisoning panic
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for MockTransport {
    fn write_line(&mut self, line: &str) -> Result<(), DmmError> {
        let mut state = self.lock();
        if state.closed {
            return Err(DmmError::SessionClosed);
        }
        state.written.push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, DmmError> {
        let mut state = self.lock();
        if state.closed {
            return Err(DmmError::SessionClosed);
        }
        state.responses.pop_front().ok_or(DmmError::Timeout)
    }

    fn close(&mut self) -> Result<(), DmmError> {
        self.lock().closed = true;
        Ok(())
    }

    fn peer(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_and_replays() {
        let mock = MockTransport::new();
        mock.push_response("+1").push_response("2.0\n");

        let mut transport = mock.clone();
        transport.write_line("SAMP:COUN?").unwrap();
        assert_eq!(transport.read_line().unwrap(), "+1\n");
        assert_eq!(transport.read_line().unwrap(), "2.0\n");
        assert!(matches!(transport.read_line(), Err(DmmError::Timeout)));

        assert_eq!(mock.written(), vec!["SAMP:COUN?"]);
        assert_eq!(mock.pending_responses(), 0);
    }

    #[test]
    fn test_closed_mock_refuses_io() {
        let mock = MockTransport::new();
        let mut transport = mock.clone();
        transport.close().unwrap();
        assert!(mock.is_closed());
        assert!(matches!(
            transport.write_line("*RST"),
            Err(DmmError::SessionClosed)
        ));
    }
}
