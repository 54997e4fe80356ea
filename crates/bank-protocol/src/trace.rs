//! Binary trace files.
//!
//! A trace drives one simulation run. The format is an 8-byte header
//! (`atm_count` then `account_count`, both little-endian `i32`) followed
//! by consecutive fixed-width command records. The same stream is handed
//! to every ATM engine, which filters out the commands addressed to it.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::TraceError;
use crate::message::{Command, RECORD_SIZE};

/// Size of the trace header, in bytes.
const HEADER_SIZE: usize = 8;

/// The trace header: how many ATM processes and accounts the run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceHeader {
    pub atm_count: i32,
    pub account_count: i32,
}

/// A trace file opened for reading.
///
/// The command sequence is lazy, finite, and non-restartable: records
/// are read one at a time until clean end-of-file.
#[derive(Debug)]
pub struct TraceFile {
    reader: BufReader<File>,
    header: TraceHeader,
}

impl TraceFile {
    /// Opens a trace file and validates its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TraceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);

        let mut raw = [0u8; HEADER_SIZE];
        reader.read_exact(&mut raw).map_err(TraceError::Read)?;
        let header = TraceHeader {
            atm_count: i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            account_count: i32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
        };
        if header.atm_count <= 0 || header.account_count <= 0 {
            return Err(TraceError::InvalidHeader {
                reason: format!(
                    "atm_count = {}, account_count = {} (both must be positive)",
                    header.atm_count, header.account_count
                ),
            });
        }

        Ok(Self { reader, header })
    }

    /// Returns the trace header.
    pub fn header(&self) -> &TraceHeader {
        &self.header
    }

    /// Reads the next command, or `None` at clean end-of-file.
    pub fn read_command(&mut self) -> Result<Option<Command>, TraceError> {
        let mut block = [0u8; RECORD_SIZE];
        let mut filled = 0;
        while filled < RECORD_SIZE {
            let n = self
                .reader
                .read(&mut block[filled..])
                .map_err(TraceError::Read)?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(TraceError::Truncated {
                    got: filled,
                    expected: RECORD_SIZE,
                });
            }
            filled += n;
        }
        Ok(Some(Command::decode(&block)?))
    }

    /// Reads the remaining commands to end-of-file.
    pub fn commands(&mut self) -> Result<Vec<Command>, TraceError> {
        let mut commands = Vec::new();
        while let Some(command) = self.read_command()? {
            commands.push(command);
        }
        Ok(commands)
    }
}

/// Writes a trace file in the same format (used by `banksim generate`
/// and the test suites).
pub struct TraceWriter {
    writer: BufWriter<File>,
}

impl TraceWriter {
    /// Creates a trace file and writes its header.
    pub fn create(
        path: impl AsRef<Path>,
        atm_count: i32,
        account_count: i32,
    ) -> Result<Self, TraceError> {
        if atm_count <= 0 || account_count <= 0 {
            return Err(TraceError::InvalidHeader {
                reason: format!(
                    "atm_count = {atm_count}, account_count = {account_count} (both must be positive)"
                ),
            });
        }
        let file = File::create(path.as_ref()).map_err(TraceError::Write)?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&atm_count.to_le_bytes())
            .and_then(|()| writer.write_all(&account_count.to_le_bytes()))
            .map_err(TraceError::Write)?;
        Ok(Self { writer })
    }

    /// Appends one command record.
    pub fn write_command(&mut self, command: &Command) -> Result<(), TraceError> {
        self.writer
            .write_all(&command.encode())
            .map_err(TraceError::Write)
    }

    /// Flushes and closes the trace.
    pub fn finish(mut self) -> Result<(), TraceError> {
        self.writer.flush().map_err(TraceError::Write)
    }
}
