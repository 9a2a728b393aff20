//! Relay Session
//!
//! Pairs one accepted client connection with one freshly dialed upstream
//! connection and drives the two copy loops to completion.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::echo::EchoSink;
use crate::relay::copy::{copy_direction, CopyStats, Direction};

/// An active relay session
#[derive(Debug)]
pub struct RelaySession {
    pub id: u64,
    pub client_addr: SocketAddr,
    pub upstream_addr: SocketAddr,
    start_time: Instant,
    bytes_up: AtomicU64,
    bytes_down: AtomicU64,
}

impl RelaySession {
    pub fn new(id: u64, client_addr: SocketAddr, upstream_addr: SocketAddr) -> Self {
        debug!(
            "Creating relay session {} ({} -> {})",
            id, client_addr, upstream_addr
        );

        Self {
            id,
            client_addr,
            upstream_addr,
            start_time: Instant::now(),
            bytes_up: AtomicU64::new(0),
            bytes_down: AtomicU64::new(0),
        }
    }

    /// Bytes forwarded client -> upstream
    pub fn bytes_up(&self) -> u64 {
        self.bytes_up.load(Ordering::Relaxed)
    }

    /// Bytes forwarded upstream -> client
    pub fn bytes_down(&self) -> u64 {
        self.bytes_down.load(Ordering::Relaxed)
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes_up() + self.bytes_down()
    }

    pub fn duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Record the final counters of both finished copy loops
    pub fn record(&self, up: &CopyStats, down: &CopyStats) {
        self.bytes_up.store(up.bytes, Ordering::Relaxed);
        self.bytes_down.store(down.bytes, Ordering::Relaxed);
    }

    /// Log a completion summary for the session
    pub fn log_summary(&self, up: &CopyStats, down: &CopyStats) {
        info!(
            session_id = self.id,
            client_addr = %self.client_addr,
            upstream_addr = %self.upstream_addr,
            duration_ms = self.duration().as_millis() as u64,
            bytes_up = self.bytes_up(),
            bytes_down = self.bytes_down(),
            up_outcome = ?up.outcome,
            down_outcome = ?down.outcome,
            "Relay session ended"
        );
    }
}

/// Run one session to completion.
///
/// Dials the upstream, then relays bytes in both directions until both copy
/// loops have terminated. A dial failure aborts only this session: the
/// accepted client connection is dropped without a reply, matching the
/// bridge's silent-close contract, and the listener keeps accepting.
pub async fn run(id: u64, client: TcpStream, config: Arc<Config>, echo: Arc<EchoSink>) {
    let client_addr = match client.peer_addr() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Session {}: client peer address unavailable: {}", id, e);
            return;
        }
    };

    let target = config.upstream.addr();
    let upstream = match TcpStream::connect(target.as_str()).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(
                "Session {}: failed to dial upstream {}: {} (closing client {})",
                id, target, e, client_addr
            );
            return;
        }
    };

    let upstream_addr = match upstream.peer_addr() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Session {}: upstream peer address unavailable: {}", id, e);
            return;
        }
    };

    let session = RelaySession::new(id, client_addr, upstream_addr);
    info!(
        "Session {}: relaying {} <-> {}",
        id, client_addr, upstream_addr
    );

    let (client_rd, client_wr) = client.into_split();
    let (upstream_rd, upstream_wr) = upstream.into_split();
    let buffer_size = config.server.buffer_size;

    // The loops do not synchronize; each exits on its own failure, and the
    // write-half shutdown at loop exit unblocks the sibling's socket.
    let (up, down) = tokio::join!(
        copy_direction(
            client_rd,
            upstream_wr,
            &echo,
            buffer_size,
            Direction::ClientToUpstream,
        ),
        copy_direction(
            upstream_rd,
            client_wr,
            &echo,
            buffer_size,
            Direction::UpstreamToClient,
        ),
    );

    session.record(&up, &down);
    session.log_summary(&up, &down);
}
