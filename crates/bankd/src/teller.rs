//! Command validation, ledger mutation, and reply construction.
//!
//! The teller is a pure request processor: given one decoded command it
//! validates the originating ATM, applies the ledger change, and returns
//! the reply record for the dispatch loop to route. It owns the ledger
//! and the active-ATM counter explicitly; there is no module-level state.

use thiserror::Error;
use tracing::debug;

use bank_core::{DomainError, Ledger};
use bank_protocol::{Command, MessageKind};

/// Outcome of handling one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// A reply to route to the originating ATM's outbound channel.
    Reply(Command),

    /// The command named an ATM outside the registry. No reply is
    /// produced: the requester is, by definition, not one of our
    /// channels, so there is nowhere trustworthy to send one.
    UnknownAtm,
}

/// Fatal protocol violations seen by the teller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TellerError {
    /// A reply-only kind arrived as a request; a protocol or version
    /// mismatch, not something the loop can recover from.
    #[error("invalid request kind {kind:?} from ATM {atm_id}")]
    UnknownCommand { kind: MessageKind, atm_id: i32 },
}

/// The bank's teller: ledger, ATM registry bounds, and the active-ATM
/// counter.
pub struct Teller {
    ledger: Ledger,
    atm_count: usize,
    atms_remaining: usize,
}

impl Teller {
    /// Opens the bank for business with `atm_count` ATMs and
    /// `account_count` zero-balance accounts.
    pub fn new(atm_count: usize, account_count: usize) -> Self {
        Self {
            ledger: Ledger::new(account_count),
            atm_count,
            atms_remaining: atm_count,
        }
    }

    /// Number of ATMs that have not yet sent EXIT.
    pub fn atms_remaining(&self) -> usize {
        self.atms_remaining
    }

    /// Read access to the ledger (used by tests and the shutdown dump).
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Consumes the teller, releasing the ledger for the final dump.
    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    /// Processes one decoded command to completion.
    pub fn handle(&mut self, command: &Command) -> Result<Handled, TellerError> {
        if !self.is_known_atm(command.atm_id) {
            return Ok(Handled::UnknownAtm);
        }

        let reply = match command.kind {
            MessageKind::Connect => {
                // always succeeds; the sentinel fields carry no balance
                Command::ok(command.atm_id, -1, -1, -1)
            }
            MessageKind::Exit => {
                self.atms_remaining = self.atms_remaining.saturating_sub(1);
                debug!(
                    atm = command.atm_id,
                    remaining = self.atms_remaining,
                    "ATM exited"
                );
                self.echo_ok(command)
            }
            MessageKind::Balance => match self.ledger.balance(command.from_account) {
                Ok(balance) => Command::ok(
                    command.atm_id,
                    command.from_account,
                    command.to_account,
                    wire_balance(balance),
                ),
                Err(err) => self.rejection(command, &err),
            },
            MessageKind::Deposit => {
                match self
                    .ledger
                    .deposit(command.to_account, i64::from(command.amount))
                {
                    Ok(()) => self.echo_ok(command),
                    Err(err) => self.rejection(command, &err),
                }
            }
            MessageKind::Withdraw => {
                match self
                    .ledger
                    .withdraw(command.from_account, i64::from(command.amount))
                {
                    Ok(()) => self.echo_ok(command),
                    Err(err) => self.rejection(command, &err),
                }
            }
            MessageKind::Transfer => {
                match self.ledger.transfer(
                    command.from_account,
                    command.to_account,
                    i64::from(command.amount),
                ) {
                    Ok(()) => self.echo_ok(command),
                    Err(err) => self.rejection(command, &err),
                }
            }
            kind => {
                return Err(TellerError::UnknownCommand {
                    kind,
                    atm_id: command.atm_id,
                })
            }
        };

        Ok(Handled::Reply(reply))
    }

    fn is_known_atm(&self, atm_id: i32) -> bool {
        usize::try_from(atm_id)
            .map(|id| id < self.atm_count)
            .unwrap_or(false)
    }

    /// OK reply echoing the request's fields.
    fn echo_ok(&self, command: &Command) -> Command {
        Command::ok(
            command.atm_id,
            command.from_account,
            command.to_account,
            command.amount,
        )
    }

    /// Maps a domain rejection to its reply record.
    fn rejection(&self, command: &Command, err: &DomainError) -> Command {
        debug!(atm = command.atm_id, error = %err, "command rejected");
        match err {
            DomainError::UnknownAccount { account } => {
                Command::account_unknown(command.atm_id, *account)
            }
            DomainError::InsufficientFunds {
                account, requested, ..
            } => Command::no_funds(command.atm_id, *account, wire_balance(*requested)),
        }
    }
}

/// Clamps a ledger balance into the wire's i32 amount field.
fn wire_balance(balance: i64) -> i32 {
    balance.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(teller: &mut Teller, command: Command) -> Command {
        match teller.handle(&command).unwrap() {
            Handled::Reply(reply) => reply,
            Handled::UnknownAtm => panic!("expected a reply for {command:?}"),
        }
    }

    #[test]
    fn test_connect_replies_ok_with_sentinels() {
        let mut teller = Teller::new(2, 2);
        let reply = reply(&mut teller, Command::connect(1));
        assert_eq!(reply, Command::ok(1, -1, -1, -1));
        // ledger untouched
        assert_eq!(teller.ledger().balance(0).unwrap(), 0);
    }

    #[test]
    fn test_deposit_credits_and_echoes() {
        let mut teller = Teller::new(1, 2);
        let r = reply(&mut teller, Command::deposit(0, 1, 100));
        assert_eq!(r.kind, MessageKind::Ok);
        assert_eq!(r.atm_id, 0);
        assert_eq!(teller.ledger().balance(1).unwrap(), 100);
    }

    #[test]
    fn test_balance_reply_carries_amount() {
        let mut teller = Teller::new(1, 1);
        reply(&mut teller, Command::deposit(0, 0, 250));
        let r = reply(&mut teller, Command::balance(0, 0));
        assert_eq!(r.kind, MessageKind::Ok);
        assert_eq!(r.amount, 250);
    }

    #[test]
    fn test_balance_saturates_past_i32() {
        let mut teller = Teller::new(1, 1);
        reply(&mut teller, Command::deposit(0, 0, i32::MAX));
        reply(&mut teller, Command::deposit(0, 0, i32::MAX));
        let r = reply(&mut teller, Command::balance(0, 0));
        assert_eq!(r.amount, i32::MAX);
    }

    #[test]
    fn test_withdraw_insufficient_funds() {
        let mut teller = Teller::new(1, 1);
        reply(&mut teller, Command::deposit(0, 0, 30));
        let r = reply(&mut teller, Command::withdraw(0, 0, 50));
        assert_eq!(r.kind, MessageKind::NoFunds);
        assert_eq!(r.from_account, 0);
        assert_eq!(teller.ledger().balance(0).unwrap(), 30);
    }

    #[test]
    fn test_transfer_and_unknown_destination() {
        let mut teller = Teller::new(1, 2);
        reply(&mut teller, Command::deposit(0, 0, 100));

        let r = reply(&mut teller, Command::transfer(0, 0, 1, 40));
        assert_eq!(r.kind, MessageKind::Ok);
        assert_eq!(teller.ledger().balance(0).unwrap(), 60);
        assert_eq!(teller.ledger().balance(1).unwrap(), 40);

        let r = reply(&mut teller, Command::transfer(0, 0, 7, 10));
        assert_eq!(r.kind, MessageKind::AccountUnknown);
        assert_eq!(r.from_account, 7);
    }

    #[test]
    fn test_balance_unknown_account() {
        let mut teller = Teller::new(1, 2);
        let r = reply(&mut teller, Command::balance(0, 5));
        assert_eq!(r.kind, MessageKind::AccountUnknown);
        assert_eq!(r.from_account, 5);
    }

    #[test]
    fn test_exit_decrements_active_counter() {
        let mut teller = Teller::new(2, 1);
        assert_eq!(teller.atms_remaining(), 2);

        let r = reply(&mut teller, Command::exit(0));
        assert_eq!(r.kind, MessageKind::Ok);
        assert_eq!(teller.atms_remaining(), 1);

        reply(&mut teller, Command::exit(1));
        assert_eq!(teller.atms_remaining(), 0);
    }

    #[test]
    fn test_unknown_atm_is_silently_dropped() {
        let mut teller = Teller::new(2, 1);
        assert_eq!(
            teller.handle(&Command::deposit(7, 0, 10)).unwrap(),
            Handled::UnknownAtm
        );
        assert_eq!(
            teller.handle(&Command::deposit(-1, 0, 10)).unwrap(),
            Handled::UnknownAtm
        );
        // nothing reached the ledger
        assert_eq!(teller.ledger().balance(0).unwrap(), 0);
    }

    #[test]
    fn test_reply_kind_as_request_is_fatal() {
        let mut teller = Teller::new(1, 1);
        let err = teller
            .handle(&Command::new(MessageKind::Ok, 0, -1, -1, -1))
            .unwrap_err();
        assert_eq!(
            err,
            TellerError::UnknownCommand {
                kind: MessageKind::Ok,
                atm_id: 0
            }
        );
    }
}
