//! Configuration loading for the catalog index tooling.
//!
//! Layered precedence: built-in defaults, then the config file at
//! ~/.config/catalog-index/config.toml, then an explicitly passed file,
//! then CATALOG_* environment variables. CLI flags are applied last by
//! the caller.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::CatalogError;

/// Stock aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSettings {
    /// Store-wide manage-stock toggle. When true, stock items are managed
    /// unless they explicitly opt out; when false, only items that
    /// explicitly opt in can go out of stock.
    #[serde(default = "default_manage_stock")]
    pub manage_stock: bool,
}

fn default_manage_stock() -> bool {
    true
}

impl Default for StockSettings {
    fn default() -> Self {
        Self {
            manage_stock: default_manage_stock(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// How many backlog rows one drain pass claims at a time
    #[serde(default = "default_drain_batch_size")]
    pub drain_batch_size: usize,

    /// Stock aggregation settings
    #[serde(default)]
    pub stock: StockSettings,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "catalog-index")
        .map(|p| p.data_local_dir().join("catalog.db"))
        .unwrap_or_else(|| PathBuf::from("./catalog.db"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_drain_batch_size() -> usize {
    200
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            drain_batch_size: default_drain_batch_size(),
            stock: StockSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/catalog-index/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (CATALOG_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, CatalogError> {
        let config_dir = ProjectDirs::from("", "", "catalog-index")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            // 1. Built-in defaults
            .set_default("db_path", default_db_path())
            .map_err(|e| CatalogError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| CatalogError::Config(e.to_string()))?
            .set_default("drain_batch_size", default_drain_batch_size() as i64)
            .map_err(|e| CatalogError::Config(e.to_string()))?
            .set_default("stock.manage_stock", default_manage_stock())
            .map_err(|e| CatalogError::Config(e.to_string()))?
            // 2. Default config file (~/.config/catalog-index/config.toml)
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        // 3. CLI-specified config file (higher precedence than default)
        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // 4. Environment variables (highest precedence before CLI flags)
        // Format: CATALOG_DB_PATH, CATALOG_LOG_LEVEL, etc.
        builder = builder.add_source(
            Environment::with_prefix("CATALOG")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| CatalogError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| CatalogError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values no drain or rebuild could work with.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.drain_batch_size == 0 {
            return Err(CatalogError::Config(
                "drain_batch_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Expand ~ in db_path to the actual home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        if self.db_path.starts_with("~/") {
            if let Some(home) = std::env::var("HOME").ok().map(PathBuf::from) {
                return home.join(&self.db_path[2..]);
            }
        }
        PathBuf::from(&self.db_path)
    }
}
