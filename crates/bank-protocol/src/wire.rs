//! Exact-transfer I/O over byte-stream channels.
//!
//! Channels deliver bytes, not records: a single read or write may move
//! fewer bytes than asked. This layer turns that into "all of it or a
//! well-defined outcome": short transfers are retried within the call,
//! peer closure on a record boundary is reported as a value, and only
//! genuine transport failures become errors.
//!
//! This layer moves bytes and nothing else: no logging, no retry policy
//! above a single call's byte budget.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{WireError, WireResult};
use crate::message::{Command, RECORD_SIZE};

/// Outcome of an exact-length receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// The full buffer was filled.
    Complete,
    /// The peer closed the channel before any of the requested bytes
    /// arrived. Not an error.
    Closed,
}

/// Writes all of `bytes` to the channel, retrying short writes.
pub async fn send_exact<W>(channel: &mut W, bytes: &[u8]) -> WireResult<()>
where
    W: AsyncWrite + Unpin,
{
    channel.write_all(bytes).await.map_err(WireError::PipeWrite)
}

/// Fills `buf` from the channel, retrying short reads.
///
/// A zero-length read with nothing yet received means the peer closed
/// the channel cleanly ([`Received::Closed`]). A zero-length read with a
/// partially filled buffer means the peer died mid-record, which is a
/// transport error.
pub async fn receive_exact<R>(channel: &mut R, buf: &mut [u8]) -> WireResult<Received>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = channel
            .read(&mut buf[filled..])
            .await
            .map_err(WireError::PipeRead)?;
        if n == 0 {
            if filled == 0 {
                return Ok(Received::Closed);
            }
            return Err(WireError::PipeRead(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("channel closed after {filled} of {} bytes", buf.len()),
            )));
        }
        filled += n;
    }
    Ok(Received::Complete)
}

/// Sends one encoded record.
pub async fn send_command<W>(channel: &mut W, command: &Command) -> WireResult<()>
where
    W: AsyncWrite + Unpin,
{
    send_exact(channel, &command.encode()).await
}

/// Receives one record, or `None` if the peer closed the channel on a
/// record boundary.
pub async fn receive_command<R>(channel: &mut R) -> WireResult<Option<Command>>
where
    R: AsyncRead + Unpin,
{
    let mut block = [0u8; RECORD_SIZE];
    match receive_exact(channel, &mut block).await? {
        Received::Closed => Ok(None),
        Received::Complete => Command::decode(&block).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_then_receive_round_trip() {
        let (mut atm_side, mut bank_side) = tokio::io::duplex(256);

        let sent = Command::deposit(0, 1, 100);
        send_command(&mut atm_side, &sent).await.unwrap();

        let received = receive_command(&mut bank_side).await.unwrap().unwrap();
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn test_receive_tolerates_partial_transfers() {
        // A tiny duplex buffer forces the writer into short writes, so the
        // reader sees the record arrive in fragments.
        let (mut writer, mut reader) = tokio::io::duplex(4);

        let sent = Command::transfer(2, 0, 1, 40);
        let writer_task = tokio::spawn(async move {
            send_command(&mut writer, &sent).await.unwrap();
            writer
        });

        let received = receive_command(&mut reader).await.unwrap().unwrap();
        assert_eq!(received, sent);
        writer_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_peer_closed_on_record_boundary() {
        let (writer, mut reader) = tokio::io::duplex(256);
        drop(writer);

        let outcome = receive_command(&mut reader).await.unwrap();
        assert_eq!(outcome, None);
    }

    #[tokio::test]
    async fn test_peer_closed_mid_record_is_an_error() {
        let (mut writer, mut reader) = tokio::io::duplex(256);

        let block = Command::balance(0, 0).encode();
        writer.write_all(&block[..7]).await.unwrap();
        drop(writer);

        let err = receive_command(&mut reader).await.unwrap_err();
        assert!(matches!(err, WireError::PipeRead(_)));
    }

    #[tokio::test]
    async fn test_receive_exact_reports_closed_only_when_nothing_owed() {
        let (writer, mut reader) = tokio::io::duplex(256);
        drop(writer);

        let mut buf = [0u8; 8];
        let outcome = receive_exact(&mut reader, &mut buf).await.unwrap();
        assert_eq!(outcome, Received::Closed);
    }

    #[tokio::test]
    async fn test_corrupt_kind_surfaces_from_receive() {
        let (mut writer, mut reader) = tokio::io::duplex(256);

        let mut block = Command::connect(0).encode();
        block[0] = 0xEE;
        writer.write_all(&block).await.unwrap();

        let err = receive_command(&mut reader).await.unwrap_err();
        assert!(matches!(err, WireError::UnknownKind { kind: 0xEE }));
    }
}
