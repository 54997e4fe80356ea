//! Fixed-width command records exchanged between ATMs and the bank.
//!
//! Every record occupies exactly [`RECORD_SIZE`] bytes on the wire: one
//! kind byte, three zero pad bytes, then four little-endian `i32` fields.
//! There are no delimiters and no variable-length forms, so the channel
//! layer can always transfer whole records by counting bytes.

use crate::error::{WireError, WireResult};

/// Encoded width of one command or reply record, in bytes.
pub const RECORD_SIZE: usize = 20;

/// The closed set of message kinds.
///
/// `Connect` through `Exit` are request kinds sent by ATMs; `Ok` through
/// `NoFunds` are reply kinds sent by the bank. Both travel in the same
/// record shape. Any byte outside this set is a protocol violation and
/// surfaces as [`WireError::UnknownKind`] at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    Connect = 0,
    Deposit = 1,
    Withdraw = 2,
    Transfer = 3,
    Balance = 4,
    Exit = 5,
    Ok = 6,
    AccountUnknown = 7,
    AtmUnknown = 8,
    NoFunds = 9,
}

impl MessageKind {
    /// Maps a wire byte back to a kind, or `None` for bytes outside the
    /// protocol.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Connect),
            1 => Some(Self::Deposit),
            2 => Some(Self::Withdraw),
            3 => Some(Self::Transfer),
            4 => Some(Self::Balance),
            5 => Some(Self::Exit),
            6 => Some(Self::Ok),
            7 => Some(Self::AccountUnknown),
            8 => Some(Self::AtmUnknown),
            9 => Some(Self::NoFunds),
            _ => None,
        }
    }

    /// Returns the wire byte for this kind.
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// True for the kinds only the bank sends.
    pub fn is_reply(self) -> bool {
        matches!(
            self,
            Self::Ok | Self::AccountUnknown | Self::AtmUnknown | Self::NoFunds
        )
    }

    /// True for the kinds only ATMs send.
    pub fn is_request(self) -> bool {
        !self.is_reply()
    }
}

/// One command or reply record.
///
/// Field semantics depend on `kind`; unused fields carry the sentinel
/// `-1`. The `atm_id` is present in both directions: requests name their
/// origin, and every reply echoes it so the dispatch loop can route the
/// reply to the originating ATM's outbound channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub kind: MessageKind,
    pub atm_id: i32,
    pub from_account: i32,
    pub to_account: i32,
    pub amount: i32,
}

impl Command {
    pub fn new(kind: MessageKind, atm_id: i32, from_account: i32, to_account: i32, amount: i32) -> Self {
        Self {
            kind,
            atm_id,
            from_account,
            to_account,
            amount,
        }
    }

    /// Creates a CONNECT request.
    pub fn connect(atm_id: i32) -> Self {
        Self::new(MessageKind::Connect, atm_id, -1, -1, -1)
    }

    /// Creates a DEPOSIT request crediting `to_account`.
    pub fn deposit(atm_id: i32, to_account: i32, amount: i32) -> Self {
        Self::new(MessageKind::Deposit, atm_id, -1, to_account, amount)
    }

    /// Creates a WITHDRAW request debiting `from_account`.
    pub fn withdraw(atm_id: i32, from_account: i32, amount: i32) -> Self {
        Self::new(MessageKind::Withdraw, atm_id, from_account, -1, amount)
    }

    /// Creates a TRANSFER request moving `amount` between two accounts.
    pub fn transfer(atm_id: i32, from_account: i32, to_account: i32, amount: i32) -> Self {
        Self::new(MessageKind::Transfer, atm_id, from_account, to_account, amount)
    }

    /// Creates a BALANCE request for `from_account`.
    pub fn balance(atm_id: i32, from_account: i32) -> Self {
        Self::new(MessageKind::Balance, atm_id, from_account, -1, -1)
    }

    /// Creates an EXIT request.
    pub fn exit(atm_id: i32) -> Self {
        Self::new(MessageKind::Exit, atm_id, -1, -1, -1)
    }

    /// Creates an OK reply. BALANCE replies carry the balance in `amount`;
    /// the others echo the request's fields.
    pub fn ok(atm_id: i32, from_account: i32, to_account: i32, amount: i32) -> Self {
        Self::new(MessageKind::Ok, atm_id, from_account, to_account, amount)
    }

    /// Creates an ACCOUNT_UNKNOWN reply naming the offending account.
    pub fn account_unknown(atm_id: i32, account: i32) -> Self {
        Self::new(MessageKind::AccountUnknown, atm_id, account, -1, -1)
    }

    /// Creates an INSUFFICIENT_FUNDS reply naming the account and the
    /// amount that could not be covered.
    pub fn no_funds(atm_id: i32, account: i32, amount: i32) -> Self {
        Self::new(MessageKind::NoFunds, atm_id, account, -1, amount)
    }

    /// Encodes this record into its fixed-width wire form.
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut block = [0u8; RECORD_SIZE];
        block[0] = self.kind.to_wire();
        block[4..8].copy_from_slice(&self.atm_id.to_le_bytes());
        block[8..12].copy_from_slice(&self.from_account.to_le_bytes());
        block[12..16].copy_from_slice(&self.to_account.to_le_bytes());
        block[16..20].copy_from_slice(&self.amount.to_le_bytes());
        block
    }

    /// Decodes a record from its fixed-width wire form.
    ///
    /// Undersized blocks are impossible by construction (the channel layer
    /// only hands over exact-width transfers); the one failure mode left
    /// is a kind byte outside the protocol.
    pub fn decode(block: &[u8; RECORD_SIZE]) -> WireResult<Self> {
        let kind = MessageKind::from_wire(block[0])
            .ok_or(WireError::UnknownKind { kind: block[0] })?;
        Ok(Self {
            kind,
            atm_id: read_i32(block, 4),
            from_account: read_i32(block, 8),
            to_account: read_i32(block, 12),
            amount: read_i32(block, 16),
        })
    }
}

fn read_i32(block: &[u8; RECORD_SIZE], at: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&block[at..at + 4]);
    i32::from_le_bytes(raw)
}
