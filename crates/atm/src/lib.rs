//! ATM - client engine for the bank simulation
//!
//! One `AtmEngine` drives one ATM identity over its private channel pair
//! to the bank. The engine consumes the shared trace stream, filters out
//! the commands addressed to other ATMs, and runs the synchronous
//! request/reply protocol for its own: an ATM never issues a second
//! command before the first's reply arrives.
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! in production code.

pub mod engine;
pub mod error;

pub use engine::AtmEngine;
pub use error::{AtmError, AtmResult};
