use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::StorageConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SeaORM connection URL, or `memory` for the in-process repository.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    1
}

impl DatabaseConfig {
    /// Whether the in-memory repository was requested instead of a database.
    pub fn is_memory(&self) -> bool {
        self.url == "memory"
    }
}

/// Static web assets served alongside uploaded files.
#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    /// Root directory for static assets. Default: "./public".
    #[serde(default = "default_web_path")]
    pub path: PathBuf,
    /// Optional JSON file mapping MIME types to lists of extensions.
    #[serde(default)]
    pub mime_types: Option<PathBuf>,
}

fn default_web_path() -> PathBuf {
    PathBuf::from("./public")
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            path: default_web_path(),
            mime_types: None,
        }
    }
}

/// Background deletion of expired files.
#[derive(Debug, Deserialize, Clone)]
pub struct ReaperConfig {
    /// Default: false. Expiry is always enforced on read regardless.
    #[serde(default)]
    pub enabled: bool,
    /// Seconds between sweeps. Default: 300.
    #[serde(default = "default_reaper_interval_secs")]
    pub interval_secs: u64,
    /// Maximum expired rows handled per sweep. Default: 100.
    #[serde(default = "default_reaper_batch_size")]
    pub batch_size: u64,
}

fn default_reaper_interval_secs() -> u64 {
    300
}
fn default_reaper_batch_size() -> u64 {
    100
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_reaper_interval_secs(),
            batch_size: default_reaper_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("FILEDROP_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("database.url", "sqlite://filedrop.db?mode=rwc")?
            .add_source(File::with_name(&config_path).required(false))
            // Override from environment (e.g., FILEDROP__STORAGE__LIFETIME_SECS)
            .add_source(Environment::with_prefix("FILEDROP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
