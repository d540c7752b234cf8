//! Response bodies of the control surface.

use std::collections::BTreeMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use monitor_alerts::AlertRule;
use monitor_config::ScrapeTarget;
use monitor_store::Mutation;
use serde::{Deserialize, Serialize};

/// Result of a reconfigure or remove request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResponse {
    /// HTTP status code, repeated in the body.
    pub status: u16,
    /// Error text; empty on success.
    pub message: String,
    /// Alerts added by a reconfigure, or removed by a remove.
    pub alerts: Vec<AlertRule>,
    /// The submitted or removed scrape.
    pub scrape: ScrapeTarget,
}

impl MutationResponse {
    /// A successful response reporting `mutation`.
    #[must_use]
    pub fn ok(mutation: Mutation) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            message: String::new(),
            alerts: mutation.alerts,
            scrape: mutation.scrape,
        }
    }

    /// Marks the response failed with `message`.
    #[must_use]
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.status = StatusCode::INTERNAL_SERVER_ERROR.as_u16();
        self.message = message.into();
        self
    }
}

/// Result of a node reconfigure or remove request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeResponse {
    /// HTTP status code, repeated in the body.
    pub status: u16,
    /// Error text; empty on success.
    pub message: String,
    /// Node ID.
    pub id: String,
    /// Labels stored for, or removed from, the node.
    pub labels: BTreeMap<String, String>,
}

impl NodeResponse {
    /// A successful response for node `id`.
    #[must_use]
    pub fn ok(id: impl Into<String>, labels: BTreeMap<String, String>) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            message: String::new(),
            id: id.into(),
            labels,
        }
    }

    /// Marks the response failed with `message`.
    #[must_use]
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.status = StatusCode::INTERNAL_SERVER_ERROR.as_u16();
        self.message = message.into();
        self
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for MutationResponse {
    fn into_response(self) -> Response {
        (status_code(self.status), Json(self)).into_response()
    }
}

impl IntoResponse for NodeResponse {
    fn into_response(self) -> Response {
        (status_code(self.status), Json(self)).into_response()
    }
}
