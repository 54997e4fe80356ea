//! Bank Protocol - Wire protocol between ATM clients and the bank
//!
//! This crate provides the three layers everything else is built on:
//!
//! - `message` - the fixed-width command record and its codec
//! - `wire` - exact-transfer I/O over byte-stream channels, with peer
//!   closure as a first-class outcome rather than an error
//! - `trace` - the binary trace-file format that drives a simulation
//!
//! Both directions of the protocol use the same record shape; request
//! and reply kinds are distinguished purely by the kind byte.

pub mod error;
pub mod message;
pub mod trace;
pub mod wire;

pub use error::{TraceError, WireError, WireResult};
pub use message::{Command, MessageKind, RECORD_SIZE};
pub use trace::{TraceFile, TraceHeader, TraceWriter};
pub use wire::{receive_command, receive_exact, send_command, send_exact, Received};
