//! Configuration Manager

use super::Config;
use crate::Result;
use anyhow::{bail, Context};
use std::net::SocketAddr;
use std::path::Path;

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            config
                .validate()
                .context("Configuration validation failed")?;

            Ok(config)
        } else {
            tracing::warn!(
                "Configuration file not found at {}, using defaults",
                path.display()
            );
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Config> {
        let mut config = Config::default();

        if let Ok(listen_addr) = std::env::var("NETBRIDGE_LISTEN_ADDR") {
            config.server.listen_addr = listen_addr
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid NETBRIDGE_LISTEN_ADDR: {}", listen_addr))?;
        }

        if let Ok(host) = std::env::var("NETBRIDGE_UPSTREAM_HOST") {
            config.upstream.host = host;
        }

        if let Ok(port) = std::env::var("NETBRIDGE_UPSTREAM_PORT") {
            config.upstream.port = port
                .parse::<u16>()
                .with_context(|| format!("Invalid NETBRIDGE_UPSTREAM_PORT: {}", port))?;
        }

        if let Ok(echo) = std::env::var("NETBRIDGE_ECHO") {
            config.echo.enabled = echo
                .parse::<bool>()
                .with_context(|| format!("Invalid NETBRIDGE_ECHO: {}", echo))?;
        }

        if let Ok(buffer_size) = std::env::var("NETBRIDGE_BUFFER_SIZE") {
            config.server.buffer_size = buffer_size
                .parse::<usize>()
                .with_context(|| format!("Invalid NETBRIDGE_BUFFER_SIZE: {}", buffer_size))?;
        }

        if let Ok(timeout) = std::env::var("NETBRIDGE_SHUTDOWN_TIMEOUT") {
            config.server.shutdown_timeout = humantime::parse_duration(&timeout)
                .with_context(|| format!("Invalid NETBRIDGE_SHUTDOWN_TIMEOUT: {}", timeout))?;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_server_config()
            .context("Server configuration validation failed")?;

        self.validate_upstream_config()
            .context("Upstream configuration validation failed")?;

        Ok(())
    }

    fn validate_server_config(&self) -> Result<()> {
        if self.server.buffer_size == 0 {
            bail!("buffer_size must be greater than 0");
        }

        if self.server.buffer_size > 1048576 {
            bail!("buffer_size cannot exceed 1MB");
        }

        Ok(())
    }

    fn validate_upstream_config(&self) -> Result<()> {
        if self.upstream.host.is_empty() {
            bail!("upstream.host must not be empty");
        }

        if self.upstream.host.contains(':') && !self.upstream.host.contains('[') {
            bail!(
                "upstream.host must not contain a port (got '{}'); use upstream.port",
                self.upstream.host
            );
        }

        Ok(())
    }

    /// Merge with CLI arguments
    pub fn merge_with_cli_args(
        &mut self,
        listen: Option<SocketAddr>,
        port: Option<u16>,
        upstream_host: Option<&str>,
        upstream_port: Option<u16>,
        no_echo: bool,
        buffer_size: Option<usize>,
    ) {
        if let Some(addr) = listen {
            self.server.listen_addr = addr;
            tracing::info!("CLI override: listen address set to {}", addr);
        }

        if let Some(port) = port {
            self.server.listen_addr.set_port(port);
            tracing::info!("CLI override: listen port set to {}", port);
        }

        if let Some(host) = upstream_host {
            self.upstream.host = host.to_string();
            tracing::info!("CLI override: upstream host set to {}", host);
        }

        if let Some(port) = upstream_port {
            self.upstream.port = port;
            tracing::info!("CLI override: upstream port set to {}", port);
        }

        if no_echo {
            self.echo.enabled = false;
            tracing::info!("CLI override: echo disabled");
        }

        if let Some(buffer_size) = buffer_size {
            self.server.buffer_size = buffer_size;
            tracing::info!("CLI override: buffer size set to {} bytes", buffer_size);
        }
    }
}
