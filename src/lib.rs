//! Netbridge Library
//!
//! An asynchronous TCP bridge: every inbound connection is paired with a
//! freshly dialed upstream connection, and bytes are relayed in both
//! directions until either side closes. Relayed bytes can optionally be
//! mirrored to the operator console.

pub mod config;
pub mod echo;
pub mod listener;
pub mod relay;
pub mod shutdown;

pub use config::Config;
pub use echo::EchoSink;
pub use listener::Listener;
pub use shutdown::ShutdownCoordinator;

/// Common error type for the bridge
pub type Result<T> = anyhow::Result<T>;
