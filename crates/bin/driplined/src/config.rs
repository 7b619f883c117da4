//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `dripline.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use dripline_app::executor::RetryPolicy;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Engine tuning knobs.
    pub engine: EngineConfig,
    /// Collaborator toggles.
    pub collaborators: CollaboratorsConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Engine tuning knobs.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Event bus channel capacity.
    pub bus_capacity: usize,
    /// Seconds between due-run scans.
    pub resume_poll_secs: u64,
    /// Total attempts per action node, first try included.
    pub retry_max_attempts: u32,
    /// Milliseconds before the second attempt; doubles each retry.
    pub retry_base_ms: u64,
    /// Upper bound in milliseconds on any single backoff.
    pub retry_max_ms: u64,
}

/// Per-collaborator toggles.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CollaboratorsConfig {
    /// Use the virtual (in-memory) mailer, tag store, and webhook sink.
    pub virtual_enabled: bool,
}

impl Config {
    /// Load configuration from `dripline.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if
    /// the merged configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("dripline.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DRIPLINE_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("DRIPLINE_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("DRIPLINE_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("DRIPLINE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.engine.retry_max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.engine.bus_capacity == 0 {
            return Err(ConfigError::Validation(
                "bus_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl EngineConfig {
    /// The retry policy described by this configuration.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_ms),
            max_delay: Duration::from_millis(self.retry_max_ms),
        }
    }

    /// The pause between due-run scans.
    #[must_use]
    pub fn resume_poll_interval(&self) -> Duration {
        Duration::from_secs(self.resume_poll_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:dripline.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "driplined=info,dripline=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bus_capacity: 256,
            resume_poll_secs: 5,
            retry_max_attempts: 3,
            retry_base_ms: 1_000,
            retry_max_ms: 30_000,
        }
    }
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
