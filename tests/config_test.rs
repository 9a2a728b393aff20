//! Tests for configuration loading, validation, and override precedence

use std::io::Write;
use std::time::Duration;

use netbridge::config::{Config, ConfigManager};

#[test]
fn load_from_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[server]
listen_addr = "127.0.0.1:12000"
buffer_size = 4096
shutdown_timeout = "10s"

[upstream]
host = "upstream.example.com"
port = 9001

[echo]
enabled = false
"#
    )
    .unwrap();

    let config = ConfigManager::load_from_file(file.path()).unwrap();

    assert_eq!(config.server.listen_addr, "127.0.0.1:12000".parse().unwrap());
    assert_eq!(config.server.buffer_size, 4096);
    assert_eq!(config.server.shutdown_timeout, Duration::from_secs(10));
    assert_eq!(config.upstream.host, "upstream.example.com");
    assert_eq!(config.upstream.port, 9001);
    assert!(!config.echo.enabled);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.toml");

    let config = ConfigManager::load_from_file(&path).unwrap();

    assert_eq!(config.server.buffer_size, 8192);
    assert!(config.echo.enabled);
}

#[test]
fn malformed_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "this is not toml [[[").unwrap();

    assert!(ConfigManager::load_from_file(file.path()).is_err());
}

#[test]
fn zero_buffer_size_is_rejected() {
    let mut config = Config::default();
    config.server.buffer_size = 0;

    assert!(config.validate().is_err());
}

#[test]
fn oversized_buffer_is_rejected() {
    let mut config = Config::default();
    config.server.buffer_size = 2 * 1024 * 1024;

    assert!(config.validate().is_err());
}

#[test]
fn empty_upstream_host_is_rejected() {
    let mut config = Config::default();
    config.upstream.host = String::new();

    assert!(config.validate().is_err());
}

#[test]
fn upstream_host_with_embedded_port_is_rejected() {
    let mut config = Config::default();
    config.upstream.host = "127.0.0.1:9001".to_string();

    assert!(config.validate().is_err());
}

#[test]
fn defaults_are_valid() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn cli_args_take_precedence() {
    let mut config = Config::default();

    config.merge_with_cli_args(
        Some("0.0.0.0:2000".parse().unwrap()),
        Some(3000),
        Some("bridge-target"),
        Some(4000),
        true,
        Some(1024),
    );

    // --port applies on top of --listen.
    assert_eq!(config.server.listen_addr, "0.0.0.0:3000".parse().unwrap());
    assert_eq!(config.upstream.host, "bridge-target");
    assert_eq!(config.upstream.port, 4000);
    assert!(!config.echo.enabled);
    assert_eq!(config.server.buffer_size, 1024);
}

#[test]
fn upstream_addr_formats_host_and_port() {
    let config = Config::default();
    assert_eq!(config.upstream.addr(), "127.0.0.1:9001");
}
