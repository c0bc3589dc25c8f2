//! Configuration module for the udp-kit server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::runtime::socket::SocketOptions;

/// Largest payload a UDP datagram over IPv4 can carry.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Application protocol served on top of the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    /// 20-byte datagrams with an 8-byte header, answered with `GOT IT`
    Header,
    /// `PING` / `PING <msg>` answered with `PONG` / `PONG <msg>`
    Ping,
    /// Every datagram is sent back to its sender
    Echo,
}

/// What the reader does when every worker is busy and the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backpressure {
    /// Stop reading until a queue slot frees up
    Block,
    /// Discard the request and log it
    Drop,
}

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "udp-kit")]
#[command(author = "udp-kit authors")]
#[command(version = "0.1.0")]
#[command(about = "A UDP datagram server with a worker pool", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:9000)
    #[arg(short = 'l', long)]
    pub listen: Option<SocketAddr>,

    /// Protocol to serve
    #[arg(short = 'p', long, value_enum)]
    pub protocol: Option<ProtocolType>,

    /// Number of worker threads (0 = number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Requests that may wait for a free worker
    #[arg(short = 'q', long)]
    pub queue_capacity: Option<usize>,

    /// Policy when the request queue is full
    #[arg(short = 'b', long, value_enum)]
    pub backpressure: Option<Backpressure>,

    /// Receive buffer size per datagram in bytes
    #[arg(long)]
    pub max_datagram_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Socket-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Protocol to serve
    #[serde(default = "default_protocol")]
    pub protocol: ProtocolType,
    /// Receive buffer size per datagram
    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,
    /// SO_RCVBUF in bytes
    pub recv_buffer_size: Option<usize>,
    /// SO_SNDBUF in bytes
    pub send_buffer_size: Option<usize>,
    /// SO_REUSEADDR. Off by default: on UDP it lets a second socket bind
    /// the same port and take its datagrams.
    #[serde(default = "default_reuse_address")]
    pub reuse_address: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            protocol: default_protocol(),
            max_datagram_size: default_max_datagram_size(),
            recv_buffer_size: None,
            send_buffer_size: None,
            reuse_address: default_reuse_address(),
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads
    #[serde(default)]
    pub workers: usize,
    /// Requests that may wait for a free worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Policy when the queue is full
    #[serde(default = "default_backpressure")]
    pub backpressure: Backpressure,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: default_queue_capacity(),
            backpressure: default_backpressure(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

fn default_protocol() -> ProtocolType {
    ProtocolType::Header
}

fn default_max_datagram_size() -> usize {
    MAX_UDP_PAYLOAD
}

fn default_reuse_address() -> bool {
    false
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_backpressure() -> Backpressure {
    Backpressure::Block
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub protocol: ProtocolType,
    pub workers: usize,
    pub queue_capacity: usize,
    pub backpressure: Backpressure,
    pub max_datagram_size: usize,
    pub recv_buffer_size: Option<usize>,
    pub send_buffer_size: Option<usize>,
    pub reuse_address: bool,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    /// Merge CLI args over TOML values.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let workers = cli.workers.unwrap_or(toml_config.pool.workers);

        Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            protocol: cli.protocol.unwrap_or(toml_config.server.protocol),
            workers: if workers == 0 { num_cpus() } else { workers },
            queue_capacity: cli
                .queue_capacity
                .unwrap_or(toml_config.pool.queue_capacity),
            backpressure: cli.backpressure.unwrap_or(toml_config.pool.backpressure),
            max_datagram_size: cli
                .max_datagram_size
                .unwrap_or(toml_config.server.max_datagram_size)
                .min(MAX_UDP_PAYLOAD),
            recv_buffer_size: toml_config.server.recv_buffer_size,
            send_buffer_size: toml_config.server.send_buffer_size,
            reuse_address: toml_config.server.reuse_address,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }

    /// Socket options derived from this configuration.
    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions {
            reuse_address: self.reuse_address,
            recv_buffer_size: self.recv_buffer_size,
            send_buffer_size: self.send_buffer_size,
            max_datagram_size: self.max_datagram_size,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let server = ServerConfig::default();
        let pool = PoolConfig::default();
        Config {
            listen: server.listen,
            protocol: server.protocol,
            workers: num_cpus(),
            queue_capacity: pool.queue_capacity,
            backpressure: pool.backpressure,
            max_datagram_size: server.max_datagram_size,
            recv_buffer_size: server.recv_buffer_size,
            send_buffer_size: server.send_buffer_size,
            reuse_address: server.reuse_address,
            log_level: default_log_level(),
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.listen, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.server.protocol, ProtocolType::Header);
        assert_eq!(config.server.max_datagram_size, MAX_UDP_PAYLOAD);
        assert_eq!(config.pool.workers, 0);
        assert_eq!(config.pool.queue_capacity, 1024);
        assert_eq!(config.pool.backpressure, Backpressure::Block);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "0.0.0.0:5000"
            protocol = "ping"
            max_datagram_size = 1500
            recv_buffer_size = 4194304

            [pool]
            workers = 4
            queue_capacity = 64
            backpressure = "drop"

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(config.server.protocol, ProtocolType::Ping);
        assert_eq!(config.server.max_datagram_size, 1500);
        assert_eq!(config.server.recv_buffer_size, Some(4194304));
        assert!(!config.server.reuse_address);
        assert_eq!(config.pool.workers, 4);
        assert_eq!(config.pool.queue_capacity, 64);
        assert_eq!(config.pool.backpressure, Backpressure::Drop);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [server]
            protocol = "echo"
            max_datagram_size = 1500

            [pool]
            workers = 2
            backpressure = "drop"

            [logging]
            level = "warn"
            "#,
        )
        .unwrap();

        let cli = CliArgs::parse_from([
            "udp-kit",
            "--listen",
            "127.0.0.1:7000",
            "--workers",
            "8",
            "--backpressure",
            "block",
        ]);

        let config = Config::merge(cli, toml_config);
        assert_eq!(config.listen, "127.0.0.1:7000".parse().unwrap());
        assert_eq!(config.protocol, ProtocolType::Echo);
        assert_eq!(config.workers, 8);
        assert_eq!(config.backpressure, Backpressure::Block);
        assert_eq!(config.max_datagram_size, 1500);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_zero_workers_uses_cpu_count() {
        let cli = CliArgs::parse_from(["udp-kit", "--workers", "0"]);
        let config = Config::merge(cli, TomlConfig::default());
        assert!(config.workers >= 1);
    }

    #[test]
    fn test_datagram_size_capped() {
        let cli = CliArgs::parse_from(["udp-kit", "--max-datagram-size", "100000"]);
        let config = Config::merge(cli, TomlConfig::default());
        assert_eq!(config.max_datagram_size, MAX_UDP_PAYLOAD);
    }
}
