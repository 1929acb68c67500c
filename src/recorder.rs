use chrono::{DateTime, Local};
use log::{error, info, warn};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::DmmError;

/// Appends `timestamp,value` lines to a file, flushing in batches.
///
/// Transient write failures are logged and retried on the next flush; only
/// `max_flush_failures` consecutive failures surface as an error.
#[derive(Debug)]
pub struct SampleRecorder {
    buffer: Vec<(DateTime<Local>, f64)>,
    buffer_size: usize,
    file_path: PathBuf,
    flush_failures: usize,
    max_flush_failures: usize,
    written: usize,
}

impl SampleRecorder {
    pub fn new<P: Into<PathBuf>>(file_path: P, buffer_size: usize) -> Self {
        let buffer_size = buffer_size.max(1);
        Self {
            buffer: Vec::with_capacity(buffer_size),
            buffer_size,
            file_path: file_path.into(),
            flush_failures: 0,
            max_flush_failures: 10,
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn add(&mut self, timestamp: DateTime<Local>, value: f64) -> Result<(), DmmError> {
        self.buffer.push((timestamp, value));

        if self.buffer.len() >= self.buffer_size {
            self.flush()?;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), DmmError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        match self.write_buffer() {
            Ok(()) => {
                self.flush_failures = 0;
                self.written += self.buffer.len();
                self.buffer.clear();
                Ok(())
            }
            Err(e) => {
                self.flush_failures += 1;
                error!(
                    "Flush failure {}/{} for {:?}: {}",
                    self.flush_failures, self.max_flush_failures, self.file_path, e
                );

                if self.flush_failures % 3 == 0 {
                    warn!(
                        "Experiencing intermittent flush failures ({}/{})",
                        self.flush_failures, self.max_flush_failures
                    );
                }

                if self.flush_failures >= self.max_flush_failures {
                    return Err(DmmError::Io {
                        source: e,
                        context: format!(
                            "Too many consecutive flush failures ({}) for {:?}",
                            self.max_flush_failures, self.file_path
                        ),
                    });
                }

                Ok(())
            }
        }
    }

    fn write_buffer(&self) -> std::io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        let mut writer = BufWriter::new(file);
        for (timestamp, value) in &self.buffer {
            writeln!(writer, "{},{}", timestamp.to_rfc3339(), value)?;
        }
        writer.flush()
    }

    /// Samples still waiting for the next flush
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Samples successfully written to disk so far
    pub fn written(&self) -> usize {
        self.written
    }
}

impl Drop for SampleRecorder {
    fn drop(&mut self) {
        if self.flush().is_ok() && self.written > 0 {
            info!("Recorded {} samples to {:?}", self.written, self.file_path);
        }
    }
}
