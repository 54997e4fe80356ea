//! Error taxonomy for the ATM client engine.

use thiserror::Error;

use bank_protocol::WireError;

/// Errors seen while submitting commands to the bank.
///
/// The first three are protocol-level rejections the run loop reports
/// and skips past; the rest abort the engine's run.
#[derive(Error, Debug)]
pub enum AtmError {
    /// The command belongs to a different ATM, or the bank's reply says
    /// it does not know us.
    #[error("command does not belong to ATM {atm_id}")]
    UnknownAtm { atm_id: i32 },

    /// The bank rejected the named account.
    #[error("unknown account {account}")]
    UnknownAccount { account: i32 },

    /// The bank reported insufficient funds.
    #[error("not enough funds in account {account}")]
    NoFunds { account: i32 },

    /// A request or reply kind outside the protocol; a version mismatch.
    #[error("protocol violation: unrecognized message kind")]
    UnknownCommand,

    /// Transport failure, including the bank closing the channel while a
    /// reply was owed.
    #[error(transparent)]
    Wire(#[from] WireError),
}

impl AtmError {
    /// Rejections the driving loop logs and continues past.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnknownAtm { .. } | Self::UnknownAccount { .. } | Self::NoFunds { .. }
        )
    }
}

/// Result type for ATM engine operations.
pub type AtmResult<T> = Result<T, AtmError>;
