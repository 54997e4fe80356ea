//! Bank Core - Shared domain types for the bank simulation
//!
//! This crate provides the pure domain layer shared between the bank
//! daemon (bankd) and the test suites: the account ledger and the
//! domain error taxonomy. It performs no I/O.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or unchecked indexing.

pub mod error;
pub mod ledger;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use ledger::Ledger;
