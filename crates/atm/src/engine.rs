//! Per-ATM client engine.
//!
//! State machine per ATM identity: `Disconnected -> Connected ->
//! (per command) Awaiting-Reply -> Connected -> ... -> Exited`. The
//! engine is constructed with exactly one identity and must not be
//! reused for another: the CONNECT-idempotency flag is per instance.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use bank_protocol::{wire, Command, MessageKind, WireError};

use crate::error::{AtmError, AtmResult};

/// The client engine for one ATM identity.
///
/// Generic over the channel halves so tests can drive it with in-memory
/// streams; the simulation driver hands it pipe endpoints.
pub struct AtmEngine<R, W> {
    atm_id: i32,
    inbound: R,
    outbound: W,
    connected: bool,
}

impl<R, W> AtmEngine<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates an engine for `atm_id` over its channel pair.
    pub fn new(atm_id: i32, inbound: R, outbound: W) -> Self {
        Self {
            atm_id,
            inbound,
            outbound,
            connected: false,
        }
    }

    /// Returns this engine's identity.
    pub fn atm_id(&self) -> i32 {
        self.atm_id
    }

    /// Submits one intended command.
    ///
    /// Commands addressed to another ATM are rejected locally and never
    /// forwarded; so is a repeated CONNECT (a local no-op) and any kind
    /// outside the request set. Everything else is one synchronous
    /// request/reply exchange with the bank.
    pub async fn submit(&mut self, command: &Command) -> AtmResult<()> {
        if command.atm_id != self.atm_id {
            return Err(AtmError::UnknownAtm {
                atm_id: command.atm_id,
            });
        }
        if !command.kind.is_request() {
            return Err(AtmError::UnknownCommand);
        }
        if command.kind == MessageKind::Connect {
            if self.connected {
                debug!(atm = self.atm_id, "already connected, CONNECT not forwarded");
                return Ok(());
            }
            self.connected = true;
        }

        debug!(atm = self.atm_id, kind = ?command.kind, "atm sending command");
        wire::send_command(&mut self.outbound, command).await?;

        let reply = wire::receive_command(&mut self.inbound).await?.ok_or_else(|| {
            WireError::PipeRead(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "bank closed the channel while a reply was owed",
            ))
        })?;
        debug!(atm = self.atm_id, kind = ?reply.kind, "atm received reply");

        self.interpret(&reply)
    }

    /// Maps a reply kind into the client-visible outcome.
    fn interpret(&self, reply: &Command) -> AtmResult<()> {
        match reply.kind {
            MessageKind::Ok => Ok(()),
            MessageKind::AccountUnknown => Err(AtmError::UnknownAccount {
                account: reply.from_account,
            }),
            MessageKind::AtmUnknown => Err(AtmError::UnknownAtm {
                atm_id: self.atm_id,
            }),
            MessageKind::NoFunds => Err(AtmError::NoFunds {
                account: reply.from_account,
            }),
            _ => Err(AtmError::UnknownCommand),
        }
    }

    /// Drives the engine over a finite command sequence.
    ///
    /// The sequence is the whole trace, shared across all ATMs: commands
    /// for other ATMs are skipped silently. Domain rejections are
    /// reported and processing continues; anything else aborts the run.
    /// The sequence ending is a clean stop.
    pub async fn run<I>(&mut self, commands: I) -> AtmResult<()>
    where
        I: IntoIterator<Item = Command>,
    {
        info!(atm = self.atm_id, "ATM engine starting");
        for command in commands {
            match self.submit(&command).await {
                Ok(()) => {}
                Err(AtmError::UnknownAtm { .. }) => {
                    // the shared stream carries every ATM's traffic
                }
                Err(AtmError::UnknownAccount { account }) => {
                    warn!(atm = self.atm_id, account, "unknown account, command rejected");
                }
                Err(AtmError::NoFunds { account }) => {
                    warn!(atm = self.atm_id, account, "not enough funds, retry transaction");
                }
                Err(err) => return Err(err),
            }
        }
        info!(atm = self.atm_id, "ATM engine finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bank_protocol::RECORD_SIZE;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    /// Engine wired to an in-memory bank side: one duplex per direction.
    fn wired_engine(atm_id: i32) -> (AtmEngine<DuplexStream, DuplexStream>, BankSide) {
        let (atm_inbound, bank_outbound) = tokio::io::duplex(1024);
        let (bank_inbound, atm_outbound) = tokio::io::duplex(1024);
        (
            AtmEngine::new(atm_id, atm_inbound, atm_outbound),
            BankSide {
                inbound: bank_inbound,
                outbound: bank_outbound,
            },
        )
    }

    struct BankSide {
        inbound: DuplexStream,
        outbound: DuplexStream,
    }

    impl BankSide {
        async fn expect_request(&mut self) -> Command {
            wire::receive_command(&mut self.inbound)
                .await
                .unwrap()
                .expect("bank side expected a request")
        }

        async fn reply(&mut self, reply: Command) {
            wire::send_command(&mut self.outbound, &reply).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_foreign_command_not_forwarded() {
        let (mut engine, mut bank) = wired_engine(0);

        let err = engine.submit(&Command::deposit(3, 0, 50)).await.unwrap_err();
        assert!(matches!(err, AtmError::UnknownAtm { atm_id: 3 }));

        // prove nothing hit the wire: the next exchange starts with CONNECT
        let bank_task = tokio::spawn(async move {
            let request = bank.expect_request().await;
            assert_eq!(request.kind, MessageKind::Connect);
            bank.reply(Command::ok(0, -1, -1, -1)).await;
        });
        engine.submit(&Command::connect(0)).await.unwrap();
        bank_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_second_connect_is_local_noop() {
        let (mut engine, mut bank) = wired_engine(1);

        let bank_task = tokio::spawn(async move {
            let first = bank.expect_request().await;
            assert_eq!(first.kind, MessageKind::Connect);
            bank.reply(Command::ok(1, -1, -1, -1)).await;

            // the very next record must be the EXIT, not a second CONNECT
            let second = bank.expect_request().await;
            assert_eq!(second.kind, MessageKind::Exit);
            bank.reply(Command::ok(1, -1, -1, -1)).await;
        });

        engine.submit(&Command::connect(1)).await.unwrap();
        engine.submit(&Command::connect(1)).await.unwrap();
        engine.submit(&Command::exit(1)).await.unwrap();
        bank_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_reply_kinds_map_to_outcomes() {
        let (mut engine, mut bank) = wired_engine(0);

        let bank_task = tokio::spawn(async move {
            bank.expect_request().await;
            bank.reply(Command::account_unknown(0, 9)).await;

            bank.expect_request().await;
            bank.reply(Command::no_funds(0, 0, 500)).await;

            bank.expect_request().await;
            bank.reply(Command::new(MessageKind::AtmUnknown, 0, -1, -1, -1))
                .await;
        });

        let err = engine.submit(&Command::balance(0, 9)).await.unwrap_err();
        assert!(matches!(err, AtmError::UnknownAccount { account: 9 }));
        assert!(err.is_recoverable());

        let err = engine.submit(&Command::withdraw(0, 0, 500)).await.unwrap_err();
        assert!(matches!(err, AtmError::NoFunds { account: 0 }));
        assert!(err.is_recoverable());

        let err = engine.submit(&Command::balance(0, 0)).await.unwrap_err();
        assert!(matches!(err, AtmError::UnknownAtm { atm_id: 0 }));

        bank_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_kind_in_reply_is_protocol_violation() {
        let (mut engine, mut bank) = wired_engine(0);

        let bank_task = tokio::spawn(async move {
            bank.expect_request().await;
            // a request kind where a reply belongs
            bank.reply(Command::deposit(0, 0, 1)).await;
        });

        let err = engine.submit(&Command::balance(0, 0)).await.unwrap_err();
        assert!(matches!(err, AtmError::UnknownCommand));
        bank_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_reply_kind_is_fatal() {
        let (mut engine, mut bank) = wired_engine(0);

        let bank_task = tokio::spawn(async move {
            bank.expect_request().await;
            let mut block = [0u8; RECORD_SIZE];
            block[0] = 0x7F;
            bank.outbound.write_all(&block).await.unwrap();
        });

        let err = engine.submit(&Command::balance(0, 0)).await.unwrap_err();
        assert!(matches!(
            err,
            AtmError::Wire(WireError::UnknownKind { kind: 0x7F })
        ));
        bank_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_reply_only_kind_never_forwarded() {
        let (mut engine, _bank) = wired_engine(0);
        let err = engine
            .submit(&Command::new(MessageKind::Ok, 0, -1, -1, -1))
            .await
            .unwrap_err();
        assert!(matches!(err, AtmError::UnknownCommand));
    }

    #[tokio::test]
    async fn test_bank_closing_while_reply_owed_is_fatal() {
        let (mut engine, bank) = wired_engine(0);
        // keep the bank's inbound half alive so the request is accepted,
        // then close the reply direction before anything is sent back
        let BankSide {
            inbound: _bank_inbound,
            outbound,
        } = bank;
        drop(outbound);

        let err = engine.submit(&Command::balance(0, 0)).await.unwrap_err();
        assert!(matches!(err, AtmError::Wire(WireError::PipeRead(_))));
    }

    #[tokio::test]
    async fn test_run_skips_rejections_and_finishes() {
        let (mut engine, mut bank) = wired_engine(0);

        let bank_task = tokio::spawn(async move {
            // connect
            bank.expect_request().await;
            bank.reply(Command::ok(0, -1, -1, -1)).await;
            // balance on a bad account
            bank.expect_request().await;
            bank.reply(Command::account_unknown(0, 9)).await;
            // exit
            let request = bank.expect_request().await;
            assert_eq!(request.kind, MessageKind::Exit);
            bank.reply(Command::ok(0, -1, -1, -1)).await;
        });

        let commands = vec![
            Command::connect(0),
            Command::deposit(5, 0, 10), // someone else's, skipped silently
            Command::balance(0, 9),     // rejected, run continues
            Command::exit(0),
        ];
        engine.run(commands).await.unwrap();
        bank_task.await.unwrap();

        // reads comfortably past the end of the sequence are a clean stop
        let empty: Vec<Command> = Vec::new();
        engine.run(empty).await.unwrap();
    }
}
