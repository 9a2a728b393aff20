//! Copy Loop
//!
//! Unidirectional byte-forwarding loop. Each session runs two of these, one
//! per direction, sharing nothing but the socket halves and the echo sink.

use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::echo::EchoSink;

/// Which way a copy loop forwards bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToUpstream,
    UpstreamToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToUpstream => write!(f, "client->upstream"),
            Direction::UpstreamToClient => write!(f, "upstream->client"),
        }
    }
}

/// Why a copy loop terminated
///
/// Used only for logging and tests; both causes map to the same externally
/// observable state (the loop is done and the destination is shut down).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Read returned EOF or an error
    SourceClosed,
    /// Write to the destination failed
    DestinationFailed,
}

/// Result of one finished copy loop
#[derive(Debug, Clone, Copy)]
pub struct CopyStats {
    pub outcome: CopyOutcome,
    pub bytes: u64,
}

/// Forward bytes from `src` to `dst` until either side fails.
///
/// Reads are chunked up to `buffer_size` bytes; within the direction, bytes
/// are forwarded in the order read, with no loss or duplication. Every chunk
/// is mirrored to the echo sink before being forwarded. On termination the
/// destination's write side is shut down so the peer observes EOF promptly,
/// and the loop never retries.
pub async fn copy_direction<R, W>(
    mut src: R,
    mut dst: W,
    echo: &EchoSink,
    buffer_size: usize,
    direction: Direction,
) -> CopyStats
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer_size];
    let mut bytes: u64 = 0;

    let outcome = loop {
        let n = match src.read(&mut buf).await {
            Ok(0) => {
                debug!("{}: source reached end of stream", direction);
                break CopyOutcome::SourceClosed;
            }
            Ok(n) => n,
            Err(e) => {
                debug!("{}: read failed: {}", direction, e);
                break CopyOutcome::SourceClosed;
            }
        };

        echo.write(&buf[..n]).await;

        if let Err(e) = dst.write_all(&buf[..n]).await {
            debug!("{}: write failed: {}", direction, e);
            break CopyOutcome::DestinationFailed;
        }

        bytes += n as u64;
    };

    // Propagate EOF so the sibling loop's socket unblocks.
    let _ = dst.shutdown().await;

    debug!(
        "{}: copy loop terminated ({:?}, {} bytes)",
        direction, outcome, bytes
    );

    CopyStats { outcome, bytes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tokio::io::AsyncReadExt;
    use tokio_test::io::Builder;

    fn silent_sink() -> std::sync::Arc<EchoSink> {
        EchoSink::writer(false, Box::new(tokio::io::sink()))
    }

    #[tokio::test]
    async fn forwards_bytes_in_order_until_eof() {
        let src = Builder::new().read(b"hello ").read(b"world").build();
        let (dst, mut rx) = tokio::io::duplex(64);

        let stats = copy_direction(src, dst, &silent_sink(), 8, Direction::ClientToUpstream).await;

        assert_eq!(stats.outcome, CopyOutcome::SourceClosed);
        assert_eq!(stats.bytes, 11);

        let mut out = Vec::new();
        rx.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello world");
    }

    #[tokio::test]
    async fn read_error_terminates_as_source_closed() {
        let src = Builder::new()
            .read(b"par")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let (dst, mut rx) = tokio::io::duplex(64);

        let stats = copy_direction(src, dst, &silent_sink(), 8, Direction::UpstreamToClient).await;

        assert_eq!(stats.outcome, CopyOutcome::SourceClosed);
        assert_eq!(stats.bytes, 3);

        // The partial bytes must still have been delivered, then EOF.
        let mut out = Vec::new();
        rx.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"par");
    }

    #[tokio::test]
    async fn write_error_terminates_as_destination_failed() {
        let src = Builder::new().read(b"data").build();
        let dst = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();

        let stats = copy_direction(src, dst, &silent_sink(), 8, Direction::ClientToUpstream).await;

        assert_eq!(stats.outcome, CopyOutcome::DestinationFailed);
        assert_eq!(stats.bytes, 0);
    }

    #[tokio::test]
    async fn mirrors_every_forwarded_chunk_to_the_sink() {
        let (echo_tx, mut echo_rx) = tokio::io::duplex(64);
        let sink = EchoSink::writer(true, Box::new(echo_tx));

        let src = Builder::new().read(b"ping").build();
        let (dst, _rx) = tokio::io::duplex(64);

        let stats = copy_direction(src, dst, &sink, 8, Direction::ClientToUpstream).await;
        assert_eq!(stats.bytes, 4);
        drop(sink);

        let mut mirrored = Vec::new();
        echo_rx.read_to_end(&mut mirrored).await.unwrap();
        assert_eq!(mirrored, b"ping");
    }
}
