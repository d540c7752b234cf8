//! Error types for the monitor-alerts crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading shortcuts or rendering alert rules.
#[derive(Debug, Error)]
pub enum AlertError {
    /// A shortcut definition file could not be read.
    #[error("failed to read shortcut file {path}: {source}")]
    ShortcutRead {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A shortcut definition document is not valid YAML for the table format.
    #[error("invalid shortcut definitions in {origin}: {reason}")]
    ShortcutParse {
        /// Where the definitions came from (file path or "built-in").
        origin: String,
        /// The parser message.
        reason: String,
    },

    /// Alert rules could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_yaml::Error> for AlertError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;
