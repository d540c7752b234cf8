//! Error types for the monitor-store crate.

use thiserror::Error;

/// Errors that can occur while loading state into the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SERVICE_NAME_N` and `SCRAPE_PORT_N` variables do not pair up.
    #[error("SCRAPE_PORT_* and SERVICE_NAME_* variables must come in pairs, found {count}")]
    UnpairedScrapeVariables {
        /// Number of matching variables.
        count: usize,
    },

    /// A scrape port variable is not a port number.
    #[error("invalid scrape port {key}={value}")]
    InvalidPort {
        /// The variable name.
        key: String,
        /// The raw value.
        value: String,
    },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaired_display() {
        let err = StoreError::UnpairedScrapeVariables { count: 3 };
        assert!(err.to_string().contains("found 3"));
    }

    #[test]
    fn invalid_port_display() {
        let err = StoreError::InvalidPort {
            key: "SCRAPE_PORT_1".to_string(),
            value: "http".to_string(),
        };
        assert_eq!(err.to_string(), "invalid scrape port SCRAPE_PORT_1=http");
    }
}
