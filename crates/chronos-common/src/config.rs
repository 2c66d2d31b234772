//! Configuration types for Chronos
//!
//! All sections default sensibly, so a configuration file only needs to name
//! the values it overrides.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Root configuration for Chronos
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Metadata cache configuration
    pub cache: CacheConfig,
    /// Schema resolution configuration
    pub resolution: ResolutionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject settings the metadata layer cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(Error::configuration("cache.capacity must be at least 1"));
        }
        if self.resolution.max_depth == 0 {
            return Err(Error::configuration(
                "resolution.max_depth must be at least 1",
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(Error::configuration("logging.level must not be empty"));
        }
        Ok(())
    }
}

/// Metadata cache configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of chronicles kept in the cache
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

/// Schema resolution configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Maximum number of schemas in a base chain
    pub max_depth: usize,
    /// Reject resolved schemas that are not complete
    pub require_complete: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            require_complete: true,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter, overridden by `RUST_LOG`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.capacity, 10_000);
        assert!(config.resolution.require_complete);
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            capacity = 16
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.capacity, 16);
        assert_eq!(config.resolution, ResolutionConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = Config::default();
        config.cache.capacity = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.key(), "configuration");
    }
}
