//! The bank's multiplexed dispatch loop.
//!
//! One control flow serves every ATM inbound channel. The loop blocks on
//! readiness across all still-open channels at once and, on wake, picks
//! the next ready channel *strictly after* a roving cursor, scanning
//! circularly. Always taking the lowest-indexed ready channel would let
//! one busy ATM starve the rest; the cursor guarantees that over any
//! window in which every active ATM has input pending, each is served
//! once before any is served twice.

use std::future::poll_fn;
use std::io;
use std::task::Poll;

use thiserror::Error;
use tokio::net::unix::pipe;
use tracing::{debug, info, warn};

use bank_core::Ledger;
use bank_protocol::{wire, Command, Received, WireError, RECORD_SIZE};

use crate::teller::{Handled, Teller, TellerError};

/// Errors that stop the dispatch loop.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Teller(#[from] TellerError),

    /// Every inbound channel closed while ATMs were still counted
    /// active; no further EXIT can ever arrive, so blocking on would be
    /// a livelock.
    #[error("all ATM channels closed with {remaining} ATMs still active")]
    AllChannelsClosed { remaining: usize },
}

/// One ATM's channel pair as seen from the bank. `inbound` becomes
/// `None` once the peer closes, permanently excluding the channel from
/// multiplexing.
struct AtmChannel {
    inbound: Option<pipe::Receiver>,
    outbound: pipe::Sender,
}

/// What one dispatch turn read from the chosen channel.
enum RecordRead {
    Command(Command),
    /// Peer closed on a record boundary; retire the channel.
    Closed,
    /// Readiness outlived the buffered data; go back to the multiplexer.
    NotReady,
}

/// The bank server: teller, per-ATM channel table, and the round-robin
/// cursor.
pub struct BankServer {
    teller: Teller,
    channels: Vec<AtmChannel>,
    /// Index of the most recently dispatched ATM; scanning starts just
    /// past it.
    cursor: usize,
}

impl BankServer {
    /// Creates a server over one `(inbound, outbound)` channel pair per
    /// ATM, indexed by ATM id. The topology is supplied by the caller;
    /// the server never creates or tears down channels itself.
    pub fn new(teller: Teller, channels: Vec<(pipe::Receiver, pipe::Sender)>) -> Self {
        // start the scan at index 0 on the first wake
        let cursor = channels.len().saturating_sub(1);
        Self {
            teller,
            channels: channels
                .into_iter()
                .map(|(inbound, outbound)| AtmChannel {
                    inbound: Some(inbound),
                    outbound,
                })
                .collect(),
            cursor,
        }
    }

    /// Serves all ATMs until every one has sent EXIT.
    ///
    /// Returns the final ledger for the shutdown dump. Transport errors
    /// and protocol violations stop the loop; a peer closing its channel
    /// does not.
    pub async fn run(mut self) -> Result<Ledger, DispatchError> {
        info!(
            atms = self.channels.len(),
            accounts = self.teller.ledger().account_count(),
            "bank open for business"
        );

        while self.teller.atms_remaining() > 0 {
            let index = self.next_ready().await?;
            match self.read_record(index).await? {
                RecordRead::NotReady => continue,
                RecordRead::Closed => {
                    self.retire(index);
                    continue;
                }
                RecordRead::Command(command) => {
                    debug!(atm = command.atm_id, kind = ?command.kind, "bank received command");
                    match self.teller.handle(&command)? {
                        Handled::UnknownAtm => {
                            warn!(atm = command.atm_id, "message from unknown ATM, ignoring");
                        }
                        Handled::Reply(reply) => self.send_reply(&reply).await?,
                    }
                }
            }
        }

        info!("all ATMs exited, bank closing");
        Ok(self.teller.into_ledger())
    }

    /// Blocks until some open inbound channel is ready, then returns the
    /// next ready index strictly after the cursor, scanning circularly,
    /// and advances the cursor to it.
    async fn next_ready(&mut self) -> Result<usize, DispatchError> {
        if self.channels.iter().all(|channel| channel.inbound.is_none()) {
            return Err(DispatchError::AllChannelsClosed {
                remaining: self.teller.atms_remaining(),
            });
        }

        let count = self.channels.len();
        let cursor = self.cursor;
        let index = poll_fn(|cx| {
            for step in 1..=count {
                let candidate = (cursor + step) % count;
                let Some(inbound) = self
                    .channels
                    .get(candidate)
                    .and_then(|channel| channel.inbound.as_ref())
                else {
                    continue;
                };
                match inbound.poll_read_ready(cx) {
                    Poll::Ready(Ok(())) => return Poll::Ready(Ok(candidate)),
                    Poll::Ready(Err(err)) => return Poll::Ready(Err(err)),
                    Poll::Pending => {}
                }
            }
            Poll::Pending
        })
        .await
        .map_err(WireError::PipeRead)?;

        self.cursor = index;
        Ok(index)
    }

    /// Reads one full record from the chosen channel, or observes
    /// closure.
    ///
    /// Cached readiness can outlive the buffered data, so the first
    /// chunk is read without blocking; `WouldBlock` sends the loop back
    /// to the multiplexer instead of stalling every other ATM on an idle
    /// channel. Once part of a record has arrived, the rest is owed and
    /// may be awaited.
    async fn read_record(&mut self, index: usize) -> Result<RecordRead, DispatchError> {
        let Some(inbound) = self
            .channels
            .get_mut(index)
            .and_then(|channel| channel.inbound.as_mut())
        else {
            return Ok(RecordRead::NotReady);
        };

        let mut block = [0u8; RECORD_SIZE];
        let first = match inbound.try_read(&mut block) {
            Ok(0) => return Ok(RecordRead::Closed),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                return Ok(RecordRead::NotReady)
            }
            Err(err) => return Err(WireError::PipeRead(err).into()),
        };

        if first < RECORD_SIZE {
            match wire::receive_exact(inbound, &mut block[first..]).await? {
                Received::Complete => {}
                Received::Closed => {
                    return Err(WireError::PipeRead(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("channel closed after {first} of {RECORD_SIZE} bytes"),
                    ))
                    .into());
                }
            }
        }

        Ok(RecordRead::Command(Command::decode(&block)?))
    }

    /// Permanently excludes a closed channel from multiplexing.
    fn retire(&mut self, index: usize) {
        if let Some(channel) = self.channels.get_mut(index) {
            if channel.inbound.take().is_some() {
                info!(atm = index, "ATM channel closed, retired from multiplexing");
            }
        }
    }

    /// Routes a reply to the outbound channel of the ATM it names.
    async fn send_reply(&mut self, reply: &Command) -> Result<(), DispatchError> {
        // the teller validated atm_id before building the reply
        let Some(channel) = usize::try_from(reply.atm_id)
            .ok()
            .and_then(|index| self.channels.get_mut(index))
        else {
            warn!(atm = reply.atm_id, "reply for ATM without a channel, dropped");
            return Ok(());
        };
        debug!(atm = reply.atm_id, kind = ?reply.kind, "bank sending reply");
        wire::send_command(&mut channel.outbound, reply).await?;
        Ok(())
    }
}
