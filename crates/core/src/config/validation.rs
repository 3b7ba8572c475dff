//! Configuration validation rules.
//!
//! This module provides validation logic for `CacheConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{BackendKind, CacheConfig};
use thiserror::Error;

/// Largest accepted chunk size.
const MAX_CHUNK_SIZE: usize = 1_000_000;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl CacheConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `chunk_size` is 0 or exceeds
    /// 1,000,000, and `ConfigError::Missing` if the SQLite backend is
    /// selected without a database path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid { field: "chunk_size".into(), reason: "must be greater than 0".into() });
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::Invalid {
                field: "chunk_size".into(),
                reason: format!("must not exceed {MAX_CHUNK_SIZE}"),
            });
        }

        if self.backend == BackendKind::Sqlite && self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                field: "db_path".into(),
                hint: "Set RESULT_CACHE_DB_PATH environment variable".into(),
            });
        }

        if self.backend == BackendKind::Memory && self.db_path != CacheConfig::default().db_path {
            tracing::warn!(
                db_path = %self.db_path.display(),
                "db_path is set but the memory backend ignores it"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_chunk_size_zero() {
        let config = CacheConfig { chunk_size: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "chunk_size"));
    }

    #[test]
    fn test_validate_chunk_size_exceeds_limit() {
        let config = CacheConfig { chunk_size: MAX_CHUNK_SIZE + 1, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "chunk_size"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = CacheConfig { chunk_size: 1, ..Default::default() };
        assert!(config.validate().is_ok());

        let config = CacheConfig { chunk_size: MAX_CHUNK_SIZE, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_sqlite_requires_path() {
        let config = CacheConfig { db_path: PathBuf::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "db_path"));
    }

    #[test]
    fn test_validate_memory_ignores_path() {
        let config = CacheConfig { db_path: PathBuf::new(), backend: BackendKind::Memory, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
