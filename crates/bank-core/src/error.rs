//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in ledger operations.
///
/// These are the recoverable, protocol-level rejections: the bank turns
/// them into reply records and keeps serving. Transport failures live in
/// the protocol crate, not here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Account index outside the ledger's range
    #[error("unknown account: {account}")]
    UnknownAccount { account: i32 },

    /// Withdrawal or transfer exceeding the available balance
    #[error("insufficient funds in account {account}: requested {requested}, available {available}")]
    InsufficientFunds {
        account: i32,
        requested: i64,
        available: i64,
    },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
