//! Protocol error types.
//!
//! Transport failures (`PipeRead`/`PipeWrite`) are fatal to the loop that
//! owns the channel. A peer closing its end is deliberately *not* an error;
//! the wire layer reports it as a value (see [`crate::wire::Received`]).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while moving records over a channel.
#[derive(Error, Debug)]
pub enum WireError {
    /// Transport failure while reading from a channel
    #[error("could not read message from channel: {0}")]
    PipeRead(#[source] io::Error),

    /// Transport failure while writing to a channel
    #[error("could not write message to channel: {0}")]
    PipeWrite(#[source] io::Error),

    /// A record carried a kind byte that is not part of the protocol
    #[error("unknown message kind: {kind:#04x}")]
    UnknownKind { kind: u8 },
}

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while reading or writing trace files.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("could not open trace file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("could not read trace file: {0}")]
    Read(#[source] io::Error),

    #[error("could not write trace file: {0}")]
    Write(#[source] io::Error),

    /// Header counts must both be positive
    #[error("invalid trace header: {reason}")]
    InvalidHeader { reason: String },

    /// File ended partway through a record
    #[error("truncated trace record: got {got} of {expected} bytes")]
    Truncated { got: usize, expected: usize },

    /// A record failed to decode (unknown kind byte)
    #[error(transparent)]
    Wire(#[from] WireError),
}
