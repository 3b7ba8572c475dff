//! Cache configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (RESULT_CACHE_*)
//! 2. TOML config file (if RESULT_CACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::CacheOptions;

mod validation;

pub use validation::ConfigError;

/// Key-value store the cache persists into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Memory,
}

/// Serialization format of stored values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    #[default]
    Bincode,
    Json,
}

/// Strategy behind `iter_by_docid`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InverterKind {
    #[default]
    InMemory,
    SortedRuns,
}

/// Result cache configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (RESULT_CACHE_*)
/// 2. TOML config file (if RESULT_CACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Path to the SQLite database.
    ///
    /// Set via RESULT_CACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Set via RESULT_CACHE_BACKEND (`sqlite` or `memory`).
    #[serde(default)]
    pub backend: BackendKind,

    /// Set via RESULT_CACHE_CODEC (`bincode` or `json`).
    #[serde(default)]
    pub codec: CodecKind,

    /// Set via RESULT_CACHE_INVERTER (`in_memory` or `sorted_runs`).
    #[serde(default)]
    pub inverter: InverterKind,

    /// Document ids per stored hit-list chunk.
    ///
    /// Set via RESULT_CACHE_CHUNK_SIZE environment variable.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Whether removing hits also lowers the cached match statistics.
    ///
    /// Set via RESULT_CACHE_ADJUST_STATS_ON_REMOVE environment variable.
    #[serde(default = "default_true")]
    pub adjust_stats_on_remove: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./result-cache.sqlite")
}

fn default_chunk_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            backend: BackendKind::default(),
            codec: CodecKind::default(),
            inverter: InverterKind::default(),
            chunk_size: default_chunk_size(),
            adjust_stats_on_remove: true,
        }
    }
}

impl CacheConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `RESULT_CACHE_`
    /// 2. TOML file from `RESULT_CACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("RESULT_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("RESULT_CACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Manager options carried by this configuration.
    pub fn options(&self) -> CacheOptions {
        CacheOptions { chunk_size: self.chunk_size, adjust_stats_on_remove: self.adjust_stats_on_remove }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./result-cache.sqlite"));
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.codec, CodecKind::Bincode);
        assert_eq!(config.inverter, InverterKind::InMemory);
        assert_eq!(config.chunk_size, 1000);
        assert!(config.adjust_stats_on_remove);
    }

    #[test]
    fn test_options() {
        let config = CacheConfig { chunk_size: 64, adjust_stats_on_remove: false, ..Default::default() };
        assert_eq!(config.options(), CacheOptions { chunk_size: 64, adjust_stats_on_remove: false });
    }

    #[test]
    fn test_load_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("RESULT_CACHE_CHUNK_SIZE", "250");
            jail.set_env("RESULT_CACHE_BACKEND", "memory");
            jail.set_env("RESULT_CACHE_INVERTER", "sorted_runs");
            jail.set_env("RESULT_CACHE_ADJUST_STATS_ON_REMOVE", "false");

            let config = CacheConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.chunk_size, 250);
            assert_eq!(config.backend, BackendKind::Memory);
            assert_eq!(config.inverter, InverterKind::SortedRuns);
            assert!(!config.adjust_stats_on_remove);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("cache.toml", "chunk_size = 50\ncodec = \"json\"\ndb_path = \"data/cache.db\"")?;
            jail.set_env("RESULT_CACHE_CONFIG_FILE", "cache.toml");
            jail.set_env("RESULT_CACHE_CHUNK_SIZE", "75");

            let config = CacheConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.chunk_size, 75);
            assert_eq!(config.codec, CodecKind::Json);
            assert_eq!(config.db_path, PathBuf::from("data/cache.db"));
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        Jail::expect_with(|jail| {
            jail.set_env("RESULT_CACHE_CHUNK_SIZE", "0");
            let result = CacheConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "chunk_size"));
            Ok(())
        });
    }
}
