//! Error types for the monitor server.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use monitor_alerts::AlertError;
use monitor_config::ConfigError;
use monitor_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that can occur in the monitor server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    /// A required request parameter is missing.
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Rendering or writing configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Loading startup state failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Loading shortcut definitions failed.
    #[error(transparent)]
    Alerts(#[from] AlertError),

    /// A daemon command could not be run or exited with a failure.
    #[error("{command} failed: {reason}")]
    Process {
        /// Command line that failed.
        command: String,
        /// What went wrong.
        reason: String,
    },

    /// The inventory service could not be queried.
    #[error("inventory request to {url} failed: {reason}")]
    Inventory {
        /// Requested URL.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Self::MissingParameter(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Self::Process { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "reload_failed"),
            Self::BindFailed(_, _)
            | Self::Store(_)
            | Self::Alerts(_)
            | Self::Inventory { .. }
            | Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"error":"internal_error","message":"failed to serialize error"}"#.to_string()
        });

        (status, [("content-type", "application/json")], json).into_response()
    }
}
