// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type cache configuration.
//!
//! Supports both programmatic and file-based configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default ceiling on parallel scan batches.
pub const DEFAULT_MAX_BATCHES: usize = 20;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Type cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCacheConfig {
    /// Scan modules on worker threads during bulk initialization.
    #[serde(default)]
    pub parallel_initialization: bool,

    /// Upper bound on the number of parallel scan batches.
    #[serde(default = "default_max_batches")]
    pub max_batches: usize,

    /// Scan every module the host already lists when the cache is built.
    #[serde(default = "default_true")]
    pub seed_on_start: bool,

    /// Subscribe to host module-load notifications.
    #[serde(default = "default_true")]
    pub subscribe_to_host: bool,

    /// Modules whose full name contains any of these are never scanned.
    #[serde(default)]
    pub ignored_module_patterns: Vec<String>,

    /// Types whose name contains any of these never enter the cache.
    #[serde(default)]
    pub ignored_type_patterns: Vec<String>,
}

fn default_max_batches() -> usize {
    DEFAULT_MAX_BATCHES
}

fn default_true() -> bool {
    true
}

impl Default for TypeCacheConfig {
    fn default() -> Self {
        Self {
            parallel_initialization: false,
            max_batches: DEFAULT_MAX_BATCHES,
            seed_on_start: true,
            subscribe_to_host: true,
            ignored_module_patterns: Vec::new(),
            ignored_type_patterns: Vec::new(),
        }
    }
}

impl TypeCacheConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for a cache that neither seeds nor subscribes.
    ///
    /// Useful when modules are fed explicitly via `initialize`.
    pub fn manual() -> Self {
        Self {
            seed_on_start: false,
            subscribe_to_host: false,
            ..Default::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batches == 0 {
            return Err(ConfigError::Invalid("max_batches must be at least 1".into()));
        }

        for pattern in &self.ignored_module_patterns {
            if pattern.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "ignored_module_patterns contains an empty pattern".into(),
                ));
            }
        }

        for pattern in &self.ignored_type_patterns {
            if pattern.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "ignored_type_patterns contains an empty pattern".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TypeCacheConfig::default();
        assert!(!config.parallel_initialization);
        assert_eq!(config.max_batches, 20);
        assert!(config.seed_on_start);
        assert!(config.subscribe_to_host);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = TypeCacheConfig::from_toml_str(
            r#"
            parallel_initialization = true
            ignored_type_patterns = ["Generated"]
            "#,
        )
        .unwrap();

        assert!(config.parallel_initialization);
        assert_eq!(config.max_batches, 20);
        assert_eq!(config.ignored_type_patterns, vec!["Generated".to_string()]);
        assert!(config.ignored_module_patterns.is_empty());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_batches = 4").unwrap();
        writeln!(file, "seed_on_start = false").unwrap();
        writeln!(file, "ignored_module_patterns = [\"Tests\"]").unwrap();

        let config = TypeCacheConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_batches, 4);
        assert!(!config.seed_on_start);
        assert_eq!(config.ignored_module_patterns, vec!["Tests".to_string()]);
    }

    #[test]
    fn test_missing_file() {
        let result = TypeCacheConfig::from_file("/nonexistent/typecache.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let result = TypeCacheConfig::from_toml_str("max_batches = \"many\"");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_validate_rejects_zero_batches() {
        let result = TypeCacheConfig::from_toml_str("max_batches = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_pattern() {
        let config = TypeCacheConfig {
            ignored_type_patterns: vec!["  ".into()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_manual_config() {
        let config = TypeCacheConfig::manual();
        assert!(!config.seed_on_start);
        assert!(!config.subscribe_to_host);
    }
}
