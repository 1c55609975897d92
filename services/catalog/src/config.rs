use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Secret shipped as the default; startup warns while it is in use.
pub const DEFAULT_SECRET_KEY: &str = "change-this-secret";

/// Errors raised by configuration validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Main configuration for the catalog service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Image storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// HTTP configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Expose Prometheus metrics
    #[serde(default)]
    pub metrics_enabled: bool,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Run migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Filesystem storage for uploaded images
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding one sub-directory per saree
    #[serde(default = "default_upload_root")]
    pub upload_root: PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// Listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Key material for signing notice cookies
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    /// Maximum request body size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Maximum decoded pixel count accepted by the QR endpoint
    #[serde(default = "default_max_image_pixels")]
    pub max_image_pixels: u64,
    /// Enable CORS
    #[serde(default)]
    pub cors_enabled: bool,
    /// Allowed CORS origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

// Default value functions
fn default_service_name() -> String {
    "saree-catalog".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_database_url() -> String {
    "sqlite://sarees.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_upload_root() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    5000
}

fn default_secret_key() -> String {
    DEFAULT_SECRET_KEY.to_string()
}

fn default_max_upload_bytes() -> usize {
    32 * 1024 * 1024 // 32MB
}

fn default_max_image_pixels() -> u64 {
    40_000_000
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .set_default("service.name", "saree-catalog")?
            .set_default("service.log_level", "info")?
            // Add config file if present
            .add_source(config::File::with_name("config/catalog").required(false))
            .add_source(config::File::with_name("/etc/saree-catalog/catalog").required(false))
            // Override with environment variables
            // CATALOG__STORAGE__UPLOAD_ROOT -> storage.upload_root
            .add_source(
                config::Environment::with_prefix("CATALOG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::MissingRequired("database.url".to_string()));
        }

        if self.storage.upload_root.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired(
                "storage.upload_root".to_string(),
            ));
        }

        if self.api.secret_key.len() < 8 {
            return Err(ConfigError::InvalidValue {
                key: "api.secret_key".to_string(),
                message: "must be at least 8 characters".to_string(),
            });
        }

        if self.api.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.max_upload_bytes".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.api.max_image_pixels == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.max_image_pixels".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::InvalidValue {
                key: "database.min_connections".to_string(),
                message: "must not exceed database.max_connections".to_string(),
            });
        }

        Ok(())
    }

    /// Whether the shipped secret is still in use
    pub fn uses_default_secret(&self) -> bool {
        self.api.secret_key == DEFAULT_SECRET_KEY
    }
}

impl DatabaseConfig {
    /// How long to wait for a pooled connection
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// How long an unused connection stays open
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_enabled: false,
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            run_migrations: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_root: default_upload_root(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            secret_key: default_secret_key(),
            max_upload_bytes: default_max_upload_bytes(),
            max_image_pixels: default_max_image_pixels(),
            cors_enabled: false,
            cors_origins: Vec::new(),
        }
    }
}
