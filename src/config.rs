//! Configuration module for pinboard.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{PinboardError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Header carrying the authenticated user ID, set by a trusted
    /// authenticating proxy in front of the server.
    ///
    /// When unset no principal is attached and live connections are refused.
    #[serde(default)]
    pub trusted_user_header: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            trusted_user_header: None,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file, or the connection URL when built
    /// with the `postgres` feature.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/pinboard.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Board snapshot cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Whether board snapshots are cached at all.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Time-to-live of a cached board snapshot, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    600
}

impl CacheConfig {
    /// TTL as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

/// Real-time hub configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Capacity of the hub's command intake.
    #[serde(default = "default_intake_capacity")]
    pub intake_capacity: usize,
    /// Capacity of each connection's outbound queue.
    ///
    /// A subscriber whose queue is full when an event arrives is dropped.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_queue_capacity: usize,
}

fn default_intake_capacity() -> usize {
    1024
}

fn default_outbound_capacity() -> usize {
    256
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            intake_capacity: default_intake_capacity(),
            outbound_queue_capacity: default_outbound_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty logs to stdout only.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/pinboard.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Hub configuration.
    #[serde(default)]
    pub hub: HubConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(PinboardError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| PinboardError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `PINBOARD_DATABASE_PATH`: database file path
    /// - `PINBOARD_PORT`: listen port
    /// - `PINBOARD_LOG_LEVEL`: log level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("PINBOARD_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(port) = std::env::var("PINBOARD_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PINBOARD_PORT value: {}", port),
            }
        }
        if let Ok(level) = std::env::var("PINBOARD_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.hub.intake_capacity == 0 || self.hub.outbound_queue_capacity == 0 {
            return Err(PinboardError::Config(
                "hub queue capacities must be greater than zero".to_string(),
            ));
        }
        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(PinboardError::Config(
                "cache.ttl_secs must be greater than zero when the cache is enabled".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(PinboardError::Config(
                "database.max_connections must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
