//! Error types for the monitor-config crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or writing daemon configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file or directory operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path being read, written or removed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A document could not be serialized or parsed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An environment key names a field the schema does not have.
    #[error("unknown config field: {0}")]
    UnknownField(String),

    /// An environment key path is malformed.
    #[error("invalid config path: {0}")]
    InvalidPath(String),

    /// A value could not be converted to the field's type.
    #[error("invalid value {value:?}: expected {expected}")]
    InvalidValue {
        /// The raw value.
        value: String,
        /// What the field expects.
        expected: &'static str,
    },

    /// The alertmanager URL could not be parsed.
    #[error("invalid alertmanager url {url}: {reason}")]
    InvalidUrl {
        /// The configured URL.
        url: String,
        /// The parser message.
        reason: String,
    },

    /// Alert rules could not be rendered.
    #[error(transparent)]
    Alerts(#[from] monitor_alerts::AlertError),
}

impl ConfigError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
