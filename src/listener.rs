//! Listener Implementation
//!
//! Accepts inbound connections forever and spawns one session task per
//! connection. Accept failures are logged and retried; they never stop the
//! listener. A session failure never reaches this loop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::echo::EchoSink;
use crate::relay::session;
use crate::Result;

/// Accepts client connections and manages session lifecycle
pub struct Listener {
    listener: Option<TcpListener>,
    config: Arc<Config>,
    echo: Arc<EchoSink>,
    active_sessions: Arc<AtomicUsize>,
    next_session_id: Arc<AtomicU64>,
    shutdown_flag: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Listener {
    /// Create a new Listener
    pub fn new(config: Arc<Config>, echo: Arc<EchoSink>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            listener: None,
            config,
            echo,
            active_sessions: Arc::new(AtomicUsize::new(0)),
            next_session_id: Arc::new(AtomicU64::new(1)),
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Bind the server socket without starting the accept loop.
    ///
    /// Separate from [`start`](Self::start) so callers binding port 0 can
    /// read the assigned port via [`local_addr`](Self::local_addr) first.
    pub async fn bind(&mut self) -> Result<()> {
        let listen_addr = self.config.server.listen_addr;

        info!("Binding TCP listener to {}", listen_addr);
        let listener = TcpListener::bind(listen_addr).await?;

        info!("Successfully bound to {}", listener.local_addr()?);
        self.listener = Some(listener);
        Ok(())
    }

    /// Get the bound address, if the listener is bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .as_ref()
            .and_then(|listener| listener.local_addr().ok())
    }

    /// Bind if necessary, then accept connections until shutdown
    pub async fn start(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind().await?;
        }

        self.accept_loop().await
    }

    /// Main connection acceptance loop
    async fn accept_loop(&self) -> Result<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Listener not bound"))?;

        info!(
            "Accepting connections, bridging to upstream {}",
            self.config.upstream.addr()
        );
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            if self.shutdown_flag.load(Ordering::Relaxed) {
                info!("Shutdown flag set, stopping connection acceptance");
                break;
            }

            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            if self.shutdown_flag.load(Ordering::Relaxed) {
                                debug!("Rejecting connection from {} due to shutdown", addr);
                                continue;
                            }

                            let session_id =
                                self.next_session_id.fetch_add(1, Ordering::Relaxed);
                            info!("Accepted connection from {} (session {})", addr, session_id);

                            let config = Arc::clone(&self.config);
                            let echo = Arc::clone(&self.echo);
                            let active_sessions = Arc::clone(&self.active_sessions);

                            tokio::spawn(async move {
                                active_sessions.fetch_add(1, Ordering::Relaxed);
                                let started = Instant::now();

                                session::run(session_id, stream, config, echo).await;

                                debug!(
                                    "Session {} from {} finished after {:?}",
                                    session_id,
                                    addr,
                                    started.elapsed()
                                );
                                active_sessions.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(e) => {
                            // Transient OS condition; keep accepting.
                            error!("Error accepting connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal, stopping connection acceptance");
                    self.shutdown_flag.store(true, Ordering::Relaxed);
                    break;
                }
            }
        }

        info!("Connection acceptance loop stopped");
        Ok(())
    }

    /// Get the number of live sessions
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Initiate graceful shutdown
    pub fn initiate_shutdown(&self) {
        info!("Initiating graceful shutdown of listener");
        self.shutdown_flag.store(true, Ordering::Relaxed);

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to accept loop: {}", e);
        }
    }

    /// Get a shutdown receiver for external components
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Check if shutdown has been initiated
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Wait for live sessions to finish, up to the configured timeout
    pub async fn wait_for_sessions_to_close(&self) -> Result<()> {
        let shutdown_timeout = self.config.server.shutdown_timeout;
        let start_time = Instant::now();

        info!(
            "Waiting for {} live sessions to close (timeout: {:?})",
            self.active_sessions(),
            shutdown_timeout
        );

        while self.active_sessions() > 0 && start_time.elapsed() < shutdown_timeout {
            debug!("Waiting for {} live sessions to close", self.active_sessions());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let remaining = self.active_sessions();
        let elapsed = start_time.elapsed();

        if remaining == 0 {
            info!("All sessions closed gracefully in {:?}", elapsed);
        } else {
            warn!(
                "Shutdown timeout reached after {:?} with {} sessions still live",
                elapsed, remaining
            );
        }

        Ok(())
    }

    /// Gracefully shutdown the listener
    pub async fn shutdown(&self) -> Result<()> {
        self.initiate_shutdown();
        self.wait_for_sessions_to_close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initial_state() {
        let config = Arc::new(Config::default());
        let listener = Listener::new(config, EchoSink::stdout(false));

        assert_eq!(listener.active_sessions(), 0);
        assert!(listener.local_addr().is_none());
        assert!(!listener.is_shutting_down());
    }

    #[tokio::test]
    async fn bind_to_ephemeral_port_reports_address() {
        let mut config = Config::default();
        config.server.listen_addr = "127.0.0.1:0".parse().unwrap();

        let mut listener = Listener::new(Arc::new(config), EchoSink::stdout(false));
        listener.bind().await.unwrap();

        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn shutdown_with_no_sessions_completes_quickly() {
        let config = Arc::new(Config::default());
        let listener = Listener::new(config, EchoSink::stdout(false));

        let result = tokio::time::timeout(Duration::from_secs(1), listener.shutdown()).await;
        assert!(result.is_ok());
        assert!(listener.is_shutting_down());
    }
}
