//! Configuration module for the frame-echo server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Command-line arguments for the server
#[derive(Parser, Debug, Default)]
#[command(name = "frame-echo")]
#[command(version = "0.1.0")]
#[command(about = "A single-threaded length-prefixed echo server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1:1234)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen backlog
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Maximum number of concurrent connections
    #[arg(short = 'c', long)]
    pub max_connections: Option<usize>,

    /// Poll timeout in milliseconds
    #[arg(long)]
    pub poll_timeout_ms: Option<u64>,

    /// Close connections idle for this many milliseconds (0 = never)
    #[arg(long)]
    pub idle_timeout_ms: Option<u64>,

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
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_backlog")]
    pub backlog: i32,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Capacity of the readiness event batch
    #[serde(default = "default_events_capacity")]
    pub events_capacity: usize,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// 0 disables idle expiry
    #[serde(default)]
    pub idle_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            backlog: default_backlog(),
            max_connections: default_max_connections(),
            events_capacity: default_events_capacity(),
            poll_timeout_ms: default_poll_timeout_ms(),
            idle_timeout_ms: 0,
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

fn default_listen() -> String {
    "127.0.0.1:1234".to_string()
}

fn default_backlog() -> i32 {
    1024
}

fn default_max_connections() -> usize {
    10_000
}

fn default_events_capacity() -> usize {
    1024
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub backlog: i32,
    pub max_connections: usize,
    pub events_capacity: usize,
    pub poll_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::merge(CliArgs::default(), TomlConfig::default())
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = match cli.config {
            Some(ref config_path) => {
                let contents = std::fs::read_to_string(config_path).map_err(|source| {
                    ConfigError::FileRead {
                        path: config_path.clone(),
                        source,
                    }
                })?;
                toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
                    path: config_path.clone(),
                    source,
                })?
            }
            None => TomlConfig::default(),
        };

        Ok(Self::merge(cli, toml_config))
    }

    /// Merge CLI args with TOML config (CLI takes precedence).
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let server = toml_config.server;
        Config {
            listen: cli.listen.unwrap_or(server.listen),
            backlog: cli.backlog.unwrap_or(server.backlog),
            max_connections: cli.max_connections.unwrap_or(server.max_connections),
            events_capacity: server.events_capacity,
            poll_timeout_ms: cli.poll_timeout_ms.unwrap_or(server.poll_timeout_ms),
            idle_timeout_ms: cli.idle_timeout_ms.unwrap_or(server.idle_timeout_ms),
            log_level: if !cli.log_level.is_empty() && cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Idle expiry, if enabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen, "127.0.0.1:1234");
        assert_eq!(config.backlog, 1024);
        assert_eq!(config.poll_timeout(), Duration::from_millis(1000));
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "0.0.0.0:4000"
            max_connections = 64
            poll_timeout_ms = 250
            idle_timeout_ms = 30000

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:4000");
        assert_eq!(config.server.max_connections, 64);
        assert_eq!(config.server.backlog, 1024);
        assert_eq!(config.server.poll_timeout_ms, 250);
        assert_eq!(config.server.idle_timeout_ms, 30000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [server]
            listen = "0.0.0.0:4000"
            idle_timeout_ms = 500

            [logging]
            level = "warn"
        "#,
        )
        .unwrap();

        let cli = CliArgs::parse_from([
            "frame-echo",
            "--listen",
            "127.0.0.1:5000",
            "--log-level",
            "trace",
        ]);

        let config = Config::merge(cli, toml_config);
        assert_eq!(config.listen, "127.0.0.1:5000");
        assert_eq!(config.idle_timeout(), Some(Duration::from_millis(500)));
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_toml_log_level_used_when_cli_default() {
        let toml_config: TomlConfig = toml::from_str("[logging]\nlevel = \"warn\"").unwrap();
        let cli = CliArgs::parse_from(["frame-echo"]);

        let config = Config::merge(cli, toml_config);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.listen, "127.0.0.1:1234");
    }
}
