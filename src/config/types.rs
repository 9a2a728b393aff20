//! Configuration Types

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub echo: EchoConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub buffer_size: usize,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

/// Upstream target configuration
///
/// The host is kept as a string and resolved at dial time, once per session.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    pub host: String,
    pub port: u16,
}

/// Echo sink configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EchoConfig {
    pub enabled: bool,
}

impl UpstreamConfig {
    /// Dial target in `host:port` form
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_addr: "127.0.0.1:10000".parse().unwrap(),
                buffer_size: 8192,
                shutdown_timeout: Duration::from_secs(30),
            },
            upstream: UpstreamConfig {
                host: "127.0.0.1".to_string(),
                port: 9001,
            },
            echo: EchoConfig { enabled: true },
        }
    }
}
