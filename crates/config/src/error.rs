//! Error types for configuration loading

use std::path::PathBuf;
use thiserror::Error;

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist
    #[error("Config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The configuration file exists but could not be read
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed YAML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A required key is missing or a value violates its constraint
    #[error("Invalid config key `{key}`: {reason}")]
    Schema { key: String, reason: String },
}

impl ConfigError {
    pub(crate) fn schema(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Schema {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Dotted key of the offending entry, for schema errors
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::Schema { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, ConfigError::Parse(_))
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, ConfigError::Schema { .. })
    }
}
