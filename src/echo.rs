//! Echo Sink
//!
//! Optional operator-console mirror of relayed bytes. The sink is the only
//! resource shared across all sessions: a single `write` call is atomic with
//! respect to other writers, but chunks from different directions and
//! sessions may interleave.

use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Mirrors relayed bytes to an operator-visible output stream
pub struct EchoSink {
    enabled: bool,
    out: Mutex<BoxedWriter>,
}

impl EchoSink {
    /// Create a sink that mirrors to the process stdout
    pub fn stdout(enabled: bool) -> Arc<Self> {
        Self::writer(enabled, Box::new(tokio::io::stdout()))
    }

    /// Create a sink over an arbitrary writer (used by tests)
    pub fn writer(enabled: bool, out: BoxedWriter) -> Arc<Self> {
        Arc::new(Self {
            enabled,
            out: Mutex::new(out),
        })
    }

    /// Whether relayed bytes are mirrored
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Mirror one chunk of relayed bytes.
    ///
    /// The chunk is written with a single `write_all` under the lock, so
    /// concurrent callers cannot corrupt each other's output. Write errors
    /// are swallowed: the sink must never fail or stall the relay.
    pub async fn write(&self, chunk: &[u8]) {
        if !self.enabled {
            return;
        }

        let mut out = self.out.lock().await;
        if out.write_all(chunk).await.is_ok() {
            let _ = out.flush().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn mirrors_chunks_when_enabled() {
        let (tx, mut rx) = tokio::io::duplex(64);
        let sink = EchoSink::writer(true, Box::new(tx));

        sink.write(b"ping").await;
        drop(sink);

        let mut buf = Vec::new();
        rx.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"ping");
    }

    #[tokio::test]
    async fn drops_chunks_when_disabled() {
        let (tx, mut rx) = tokio::io::duplex(64);
        let sink = EchoSink::writer(false, Box::new(tx));

        sink.write(b"secret payload").await;
        drop(sink);

        let mut buf = Vec::new();
        rx.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn concurrent_writes_do_not_interleave_within_a_chunk() {
        let (tx, mut rx) = tokio::io::duplex(1024);
        let sink = EchoSink::writer(true, Box::new(tx));

        let a = sink.clone();
        let b = sink.clone();
        let t1 = tokio::spawn(async move {
            for _ in 0..20 {
                a.write(b"aaaa").await;
            }
        });
        let t2 = tokio::spawn(async move {
            for _ in 0..20 {
                b.write(b"bbbb").await;
            }
        });
        let _ = tokio::join!(t1, t2);
        drop(sink);

        let mut buf = Vec::new();
        rx.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf.len(), 160);
        for chunk in buf.chunks(4) {
            assert!(chunk == b"aaaa" || chunk == b"bbbb");
        }
    }
}
