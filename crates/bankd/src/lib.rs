//! Bank Daemon - teller and multiplexed dispatch loop
//!
//! This crate provides the bank side of the simulation:
//! - `teller` - validates one decoded command, mutates the ledger, and
//!   builds the reply
//! - `dispatch` - serves every ATM inbound channel fairly from a single
//!   control flow
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     bankd                            │
//! ├──────────────────────────────────────────────────────┤
//! │                                                      │
//! │  ATM 0 ──┐                                           │
//! │  ATM 1 ──┼──▶ ┌────────────┐      ┌──────────────┐   │
//! │   ...    │    │ BankServer │─────▶│    Teller    │   │
//! │  ATM n ──┘    │ (dispatch) │      │ (ledger own) │   │
//! │    ▲          └─────┬──────┘      └──────────────┘   │
//! │    │                │ reply to originating ATM       │
//! │    └────────────────┘                                │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The bank is single-threaded by design: one command runs to completion
//! (validation, ledger mutation, reply send) before the next is read from
//! any channel, so the ledger needs no locking.
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! in production code; all fallible operations use `?`, pattern matching,
//! or `unwrap_or`.

pub mod dispatch;
pub mod teller;

pub use dispatch::{BankServer, DispatchError};
pub use teller::{Handled, Teller, TellerError};
