//! Connection and pool configuration
//!
//! Connection strings are looked up by name; a model's descriptor names the
//! connection it lives in (`DefaultConnection` unless overridden).
//!
//! Environment variables read by [`DatabaseConfig::from_env`]:
//! - `DATABASE_URL` registers `DefaultConnection`
//! - `CONNECTIONSTRINGS__<NAME>` registers `<NAME>`
//! - `SCOPEREPO_MAX_CONNECTIONS`, `SCOPEREPO_MIN_CONNECTIONS`
//! - `SCOPEREPO_ACQUIRE_TIMEOUT` (seconds)
//! - `SCOPEREPO_LOG_PARAMETERS` (`true`/`false`)

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::error::ModelError;
use crate::model::DEFAULT_CONNECTION;

const CONNECTION_STRING_PREFIX: &str = "CONNECTIONSTRINGS__";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("No connection string named '{name}' is configured")]
    MissingConnection { name: String },

    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}

impl From<ConfigError> for ModelError {
    fn from(err: ConfigError) -> Self {
        ModelError::Configuration(err.to_string())
    }
}

/// Connection pool sizing and timeouts
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: Option<u64>,
    pub max_lifetime_seconds: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
        }
    }
}

impl PoolConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_seconds.map(Duration::from_secs)
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseConfig {
    connection_strings: HashMap<String, String>,
    pub pool: PoolConfig,
    /// Emit bound parameters alongside logged statements
    pub log_parameters: bool,
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.connection_strings.insert(name.into(), url.into());
        self
    }

    pub fn with_default_connection(self, url: impl Into<String>) -> Self {
        self.with_connection(DEFAULT_CONNECTION, url)
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(env::vars())
    }

    /// Build from `(name, value)` pairs shaped like environment variables
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::new();

        for (key, value) in vars {
            if key == "DATABASE_URL" {
                config
                    .connection_strings
                    .insert(DEFAULT_CONNECTION.to_string(), value);
            } else if let Some(name) = key.strip_prefix(CONNECTION_STRING_PREFIX) {
                config.connection_strings.insert(name.to_string(), value);
            } else if key == "SCOPEREPO_MAX_CONNECTIONS" {
                config.pool.max_connections = parse_number(&key, &value)?;
            } else if key == "SCOPEREPO_MIN_CONNECTIONS" {
                config.pool.min_connections = parse_number(&key, &value)?;
            } else if key == "SCOPEREPO_ACQUIRE_TIMEOUT" {
                config.pool.acquire_timeout_seconds = parse_number(&key, &value)?;
            } else if key == "SCOPEREPO_LOG_PARAMETERS" {
                config.log_parameters = parse_flag(&key, &value)?;
            }
        }

        Ok(config)
    }

    /// Look up a connection string by name (case-insensitive)
    pub fn connection_string(&self, name: &str) -> Result<&str, ConfigError> {
        self.connection_strings
            .get(name)
            .or_else(|| {
                self.connection_strings
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingConnection {
                name: name.to_string(),
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.max_connections == 0 {
            return Err(ConfigError::ValidationFailed {
                field: "max_connections".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.pool.min_connections > self.pool.max_connections {
            return Err(ConfigError::ValidationFailed {
                field: "min_connections".to_string(),
                reason: format!(
                    "{} exceeds max_connections ({})",
                    self.pool.min_connections, self.pool.max_connections
                ),
            });
        }

        if let Some((name, _)) = self.connection_strings.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ConfigError::ValidationFailed {
                field: name.clone(),
                reason: "connection string cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: "a positive integer".to_string(),
    })
}

fn parse_flag(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: "true or false".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_config_from_vars() {
        let config = DatabaseConfig::from_vars(vars(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("CONNECTIONSTRINGS__REPORTING", "sqlite://reports.db"),
            ("SCOPEREPO_MAX_CONNECTIONS", "4"),
            ("SCOPEREPO_ACQUIRE_TIMEOUT", "5"),
            ("SCOPEREPO_LOG_PARAMETERS", "yes"),
            ("UNRELATED", "ignored"),
        ]))
        .unwrap();

        assert_eq!(config.connection_string("DefaultConnection").unwrap(), "sqlite::memory:");
        assert_eq!(config.connection_string("Reporting").unwrap(), "sqlite://reports.db");
        assert_eq!(config.pool.max_connections, 4);
        assert_eq!(config.pool.acquire_timeout(), Duration::from_secs(5));
        assert!(config.log_parameters);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_defaults() {
        let config = DatabaseConfig::from_vars(Vec::new()).unwrap();

        assert_eq!(config.pool, PoolConfig::default());
        assert!(!config.log_parameters);
        assert_eq!(
            config.connection_string("DefaultConnection"),
            Err(ConfigError::MissingConnection {
                name: "DefaultConnection".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = DatabaseConfig::from_vars(vars(&[("SCOPEREPO_MAX_CONNECTIONS", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = DatabaseConfig::from_vars(vars(&[("SCOPEREPO_LOG_PARAMETERS", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("SCOPEREPO_LOG_PARAMETERS"));
    }

    #[test]
    fn test_validate_pool_bounds() {
        let config = DatabaseConfig::new().with_pool(PoolConfig {
            max_connections: 2,
            min_connections: 5,
            ..PoolConfig::default()
        });
        assert!(config.validate().is_err());

        let config = DatabaseConfig::new().with_default_connection("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_error_converts_to_model_error() {
        let err: ModelError = ConfigError::MissingConnection {
            name: "Reporting".to_string(),
        }
        .into();

        assert!(matches!(err, ModelError::Configuration(_)));
    }
}
