//! Configuration module for sharebox.

use serde::Deserialize;
use std::path::Path;

use crate::lifecycle::{
    DEFAULT_EXPIRY_HOURS, DEFAULT_MAX_DOWNLOADS, MAX_EXPIRY_HOURS, MIN_EXPIRY_HOURS,
};
use crate::{Result, ShareError};

/// Web API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Whether the HTTP API is enabled.
    #[serde(default = "default_web_enabled")]
    pub enabled: bool,
    /// Host address to bind.
    #[serde(default = "default_web_host")]
    pub host: String,
    /// Port number for the HTTP API.
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// JWT secret used to verify bearer tokens (must be set if enabled).
    #[serde(default)]
    pub jwt_secret: String,
    /// Base URL used when building share links.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

fn default_web_enabled() -> bool {
    true
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    8080
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: default_web_enabled(),
            host: default_web_host(),
            port: default_web_port(),
            cors_origins: vec![],
            jwt_secret: String::new(),
            public_base_url: default_public_base_url(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/sharebox.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Blob storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for stored blobs.
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
}

fn default_storage_path() -> String {
    "data/blobs".to_string()
}

fn default_max_upload_size() -> u64 {
    100
}

impl StorageConfig {
    /// Maximum upload size in bytes.
    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            max_upload_size_mb: default_max_upload_size(),
        }
    }
}

/// File lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Expiry horizon used when an upload does not specify one.
    #[serde(default = "default_expiry_hours")]
    pub default_expiry_hours: i64,
    /// Maximum downloads used when an upload does not specify one.
    #[serde(default = "default_max_downloads")]
    pub default_max_downloads: i64,
    /// Whether the background sweep scheduler starts with the server.
    #[serde(default = "default_sweep_enabled")]
    pub sweep_enabled: bool,
    /// Interval between sweep passes in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Run the orphan reconciler once at startup.
    #[serde(default)]
    pub reconcile_on_startup: bool,
    /// Maximum access-log entries kept per file (0 = unbounded).
    #[serde(default = "default_max_access_log_entries")]
    pub max_access_log_entries: i64,
}

fn default_expiry_hours() -> i64 {
    DEFAULT_EXPIRY_HOURS
}

fn default_max_downloads() -> i64 {
    DEFAULT_MAX_DOWNLOADS
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    3600 // 1 hour
}

fn default_max_access_log_entries() -> i64 {
    1000
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            default_expiry_hours: default_expiry_hours(),
            default_max_downloads: default_max_downloads(),
            sweep_enabled: default_sweep_enabled(),
            sweep_interval_secs: default_sweep_interval(),
            reconcile_on_startup: false,
            max_access_log_entries: default_max_access_log_entries(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/sharebox.log".to_string()
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
    /// Web API configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Blob storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// File lifecycle configuration.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ShareError::Io)?;
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
        toml::from_str(s).map_err(|e| ShareError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `SHAREBOX_JWT_SECRET`: Override the JWT secret key
    pub fn apply_env_overrides(&mut self) {
        if let Ok(jwt_secret) = std::env::var("SHAREBOX_JWT_SECRET") {
            if !jwt_secret.is_empty() {
                self.web.jwt_secret = jwt_secret;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The default expiry horizon is outside 1-168 hours
    /// - The default max downloads is below 1
    /// - The sweep interval is zero
    /// - The web API is enabled but the JWT secret is not set
    pub fn validate(&self) -> Result<()> {
        let hours = self.lifecycle.default_expiry_hours;
        if !(MIN_EXPIRY_HOURS..=MAX_EXPIRY_HOURS).contains(&hours) {
            return Err(ShareError::InvalidExpiry(hours));
        }
        if self.lifecycle.default_max_downloads < 1 {
            return Err(ShareError::Config(
                "default_max_downloads must be at least 1".to_string(),
            ));
        }
        if self.lifecycle.sweep_interval_secs == 0 {
            return Err(ShareError::Config(
                "sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.web.enabled && self.web.jwt_secret.is_empty() {
            return Err(ShareError::Config(
                "web API is enabled but jwt_secret is not set. \
                 Set it in config.toml or via SHAREBOX_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        Ok(())
    }
}
