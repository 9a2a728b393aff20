//! Netbridge - Asynchronous TCP Bridge
//!
//! Listens on a configured port and, for every inbound client connection,
//! dials a fixed upstream host:port and relays bytes in both directions
//! until either side closes. Relayed bytes are optionally mirrored to the
//! operator console.
//!
//! Fatal startup failures use distinct exit statuses:
//! - 2: invalid command line (reported by clap)
//! - 3: invalid configuration (file/env parse or validation failure)
//! - 4: listen/bind failure
//!
//! Accept errors and per-session errors are never fatal.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use netbridge::{config::ConfigManager, EchoSink, Listener, ShutdownCoordinator};

/// Exit status for invalid configuration
const EXIT_INVALID_CONFIG: i32 = 3;
/// Exit status for a listen/bind failure
const EXIT_BIND_FAILED: i32 = 4;

/// CLI arguments for netbridge
#[derive(Parser, Debug)]
#[command(name = "netbridge")]
#[command(about = "Asynchronous TCP bridge between inbound clients and a fixed upstream")]
#[command(version)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "netbridge.toml",
        help = "Path to configuration file"
    )]
    pub config: PathBuf,

    /// Listen address (overrides config file)
    #[arg(short, long, help = "Listen address (e.g., 127.0.0.1:10000)")]
    pub listen: Option<SocketAddr>,

    /// Listen port (overrides config file)
    #[arg(short, long, help = "Listen port")]
    pub port: Option<u16>,

    /// Upstream host (overrides config file)
    #[arg(long, help = "Upstream host to bridge to")]
    pub upstream_host: Option<String>,

    /// Upstream port (overrides config file)
    #[arg(long, help = "Upstream port to bridge to")]
    pub upstream_port: Option<u16>,

    /// Disable mirroring relayed bytes to the console
    #[arg(long, help = "Do not mirror relayed bytes to the console")]
    pub no_echo: bool,

    /// Buffer size in bytes
    #[arg(long, help = "Transfer buffer size in bytes")]
    pub buffer_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", help = "Log level")]
    pub log_level: String,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit")]
    pub validate_config: bool,
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    init_tracing(&args);

    info!("Starting netbridge v{}", env!("CARGO_PKG_VERSION"));

    // Configuration priority: CLI args > config file > environment > defaults
    let load_result = if args.config.exists() {
        ConfigManager::load_from_file(&args.config)
    } else {
        info!("Config file not found, checking environment variables");
        ConfigManager::load_from_env()
    };

    let mut config = match load_result {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            std::process::exit(EXIT_INVALID_CONFIG);
        }
    };

    config.merge_with_cli_args(
        args.listen,
        args.port,
        args.upstream_host.as_deref(),
        args.upstream_port,
        args.no_echo,
        args.buffer_size,
    );

    if let Err(e) = config.validate() {
        error!("Configuration error: {:#}", e);
        std::process::exit(EXIT_INVALID_CONFIG);
    }

    if args.validate_config {
        info!("Configuration is valid");
        info!("  Listen address: {}", config.server.listen_addr);
        info!("  Upstream: {}", config.upstream.addr());
        info!(
            "  Echo: {}",
            if config.echo.enabled {
                "enabled"
            } else {
                "disabled"
            }
        );
        info!("  Buffer size: {} bytes", config.server.buffer_size);
        return;
    }

    info!("Listen address: {}", config.server.listen_addr);
    info!("Upstream: {}", config.upstream.addr());
    info!(
        "Echo: {}",
        if config.echo.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    let echo = EchoSink::stdout(config.echo.enabled);
    let mut listener = Listener::new(Arc::new(config), echo);

    // Bind before spawning the accept loop so a bind failure gets its own
    // exit status instead of surfacing as a generic server error.
    if let Err(e) = listener.bind().await {
        error!("Failed to bind listener: {:#}", e);
        std::process::exit(EXIT_BIND_FAILED);
    }

    let shutdown_coordinator = ShutdownCoordinator::new();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let server_handle = tokio::spawn(async move {
        tokio::select! {
            result = listener.start() => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                }
            }
            _ = shutdown_rx => {
                info!("Server task received shutdown signal");
                listener.initiate_shutdown();
                if let Err(e) = listener.wait_for_sessions_to_close().await {
                    error!("Error during session cleanup: {}", e);
                }
            }
        }
    });

    info!("Netbridge started, press Ctrl+C or send SIGTERM/SIGINT to stop");

    if let Err(e) = shutdown_coordinator.listen_for_signals().await {
        error!("Error setting up signal handlers: {}", e);
    }

    info!("Initiating graceful shutdown...");

    if shutdown_tx.send(()).is_err() {
        warn!("Failed to send shutdown signal to server task");
    }

    if let Err(e) = server_handle.await {
        if !e.is_cancelled() {
            error!("Server task failed: {}", e);
        }
    }

    info!("Server shutdown complete");
}

/// Initialize tracing/logging
fn init_tracing(args: &CliArgs) {
    let log_level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .init();
}
