//! Configuration management for DailySpark

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::cache::{QUEUE_TTL, TTL_MEDIUM};
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// JSON file backing the local cache
    pub path: String,
    /// Seconds a cached queue listing stays fresh
    #[serde(default = "default_queue_ttl")]
    pub queue_ttl: u64,
    /// Seconds cached settings stay fresh
    #[serde(default = "default_settings_ttl")]
    pub settings_ttl: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: "~/.cache/dailyspark/cache.json".to_string(),
            queue_ttl: default_queue_ttl(),
            settings_ttl: default_settings_ttl(),
        }
    }
}

fn default_queue_ttl() -> u64 {
    QUEUE_TTL
}

fn default_settings_ttl() -> u64 {
    TTL_MEDIUM
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory uploaded media is written to
    pub media_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_dir: "~/.local/share/dailyspark/media".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token -> user id
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    pub platforms: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            platforms: vec!["linkedin".to_string(), "x".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Text providers, tried in order
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Image provider, if any
    #[serde(default)]
    pub image: Option<ProviderConfig>,
}

/// An external generation command; the prompt is written to its stdin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub command: Vec<String>,
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file yields the default configuration.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Self::default_config()
        };

        if let Ok(db_path) = std::env::var("DAILYSPARK_DB_PATH") {
            config.database.path = db_path;
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/dailyspark/dailyspark.db".to_string(),
            },
            cache: CacheConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            defaults: DefaultsConfig::default(),
            generation: GenerationConfig::default(),
        }
    }

    /// Expanded path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        expand(&self.database.path)
    }

    /// Expanded path of the cache file
    pub fn cache_path(&self) -> PathBuf {
        expand(&self.cache.path)
    }

    /// Expanded media directory
    pub fn media_dir(&self) -> PathBuf {
        expand(&self.storage.media_dir)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("DAILYSPARK_CONFIG") {
        return Ok(expand(&path));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("dailyspark").join("config.toml"))
}
