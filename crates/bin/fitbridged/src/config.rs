//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `fitbridge.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::path::PathBuf;

use serde::Deserialize;

use fitbridge_domain::profile::UserProfile;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Data directory and database settings.
    pub storage: StorageConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Live BLE source settings.
    pub ble: BleSection,
    /// Simulated source settings.
    pub simulator: SimulatorSection,
    /// Rider profile feeding the VO2max estimate.
    pub profile: UserProfile,
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

/// Data directory configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the database and generated FIT files.
    pub data_dir: PathBuf,
    /// Explicit `SQLite` URL; derived from `data_dir` when empty.
    pub database_url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Live BLE source toggles.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BleSection {
    pub enabled: bool,
    /// Upper bound on a discovery scan, in seconds.
    pub scan_duration_secs: u16,
    /// GATT connection timeout, in seconds.
    pub connect_timeout_secs: u16,
}

/// Simulator toggles.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulatorSection {
    pub enabled: bool,
    pub bike: bool,
    pub rower: bool,
    pub tick_ms: u64,
    pub seed: u64,
}

impl Config {
    /// Load configuration from `fitbridge.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if
    /// validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("fitbridge.toml")?;
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
        if let Ok(val) = std::env::var("FITBRIDGE_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("FITBRIDGE_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("FITBRIDGE_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("FITBRIDGE_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("FITBRIDGE_DATABASE_URL") {
            self.storage.database_url = val;
        }
        if let Ok(val) = std::env::var("FITBRIDGE_SCAN_DURATION_SECS") {
            if let Ok(secs) = val.parse() {
                self.ble.scan_duration_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("FITBRIDGE_SIMULATOR") {
            self.simulator.enabled = matches!(val.as_str(), "1" | "true" | "yes");
        }
        if std::env::var("FITBRIDGE_DEBUG").is_ok_and(|val| val == "1" || val == "true") {
            self.logging.filter = "debug".to_string();
        }
        if let Ok(val) = std::env::var("FITBRIDGE_LOG") {
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
        if !self.ble.enabled && !self.simulator.enabled {
            return Err(ConfigError::Validation(
                "at least one of ble or simulator must be enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// The `sqlx`-compatible database URL, derived from the data
    /// directory unless overridden.
    #[must_use]
    pub fn database_url(&self) -> String {
        if self.storage.database_url.is_empty() {
            format!(
                "sqlite:{}?mode=rwc",
                self.storage.data_dir.join("fitbridge.db").display()
            )
        } else {
            self.storage.database_url.clone()
        }
    }

    /// Directory for generated FIT files.
    #[must_use]
    pub fn fit_dir(&self) -> PathBuf {
        self.storage.data_dir.join("fit")
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

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            database_url: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "fitbridged=info,fitbridge=info".to_string(),
        }
    }
}

impl Default for BleSection {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_duration_secs: 10,
            connect_timeout_secs: 20,
        }
    }
}

impl Default for SimulatorSection {
    fn default() -> Self {
        Self {
            enabled: false,
            bike: true,
            rower: true,
            tick_ms: 1_000,
            seed: 42,
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
