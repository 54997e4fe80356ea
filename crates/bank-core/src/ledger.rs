//! The account ledger owned by the bank.
//!
//! The ledger is a plain mapping from account index to balance. It is
//! owned exclusively by the bank's teller and mutated by exactly one
//! command at a time, so it needs no interior locking.

use std::io::{self, Write};

use crate::error::{DomainError, DomainResult};

/// Mapping from account index (`0..account_count`) to an integer balance.
///
/// Balances are `i64` while wire amounts are `i32`: a trace of repeated
/// maximum deposits cannot overflow the ledger even though each single
/// amount fits in 32 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    balances: Vec<i64>,
}

impl Ledger {
    /// Creates a ledger with `account_count` accounts, all at zero.
    pub fn new(account_count: usize) -> Self {
        Self {
            balances: vec![0; account_count],
        }
    }

    /// Returns the number of accounts.
    pub fn account_count(&self) -> usize {
        self.balances.len()
    }

    /// Validates an account id and returns its vector index.
    fn index_of(&self, account: i32) -> DomainResult<usize> {
        usize::try_from(account)
            .ok()
            .filter(|index| *index < self.balances.len())
            .ok_or(DomainError::UnknownAccount { account })
    }

    /// Returns the current balance of `account`.
    pub fn balance(&self, account: i32) -> DomainResult<i64> {
        let index = self.index_of(account)?;
        Ok(self.balances.get(index).copied().unwrap_or(0))
    }

    /// Credits `amount` to `account`.
    pub fn deposit(&mut self, account: i32, amount: i64) -> DomainResult<()> {
        let index = self.index_of(account)?;
        if let Some(balance) = self.balances.get_mut(index) {
            *balance += amount;
        }
        Ok(())
    }

    /// Debits `amount` from `account`, leaving the ledger untouched if the
    /// balance does not cover it.
    pub fn withdraw(&mut self, account: i32, amount: i64) -> DomainResult<()> {
        let index = self.index_of(account)?;
        let available = self.balances.get(index).copied().unwrap_or(0);
        if available < amount {
            return Err(DomainError::InsufficientFunds {
                account,
                requested: amount,
                available,
            });
        }
        if let Some(balance) = self.balances.get_mut(index) {
            *balance -= amount;
        }
        Ok(())
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// Both accounts are validated before anything is debited; `from` is
    /// checked first so a bad source is reported before a bad destination.
    /// No observer can see the debit without the credit: the teller runs
    /// each command to completion before the next is read.
    pub fn transfer(&mut self, from: i32, to: i32, amount: i64) -> DomainResult<()> {
        let from_index = self.index_of(from)?;
        let to_index = self.index_of(to)?;

        let available = self.balances.get(from_index).copied().unwrap_or(0);
        if available < amount {
            return Err(DomainError::InsufficientFunds {
                account: from,
                requested: amount,
                available,
            });
        }

        if let Some(balance) = self.balances.get_mut(from_index) {
            *balance -= amount;
        }
        if let Some(balance) = self.balances.get_mut(to_index) {
            *balance += amount;
        }
        Ok(())
    }

    /// Writes the final balances, one `Account N: B` line per account.
    pub fn dump<W: Write>(&self, mut out: W) -> io::Result<()> {
        for (account, balance) in self.balances.iter().enumerate() {
            writeln!(out, "Account {account}: {balance}")?;
        }
        Ok(())
    }
}
