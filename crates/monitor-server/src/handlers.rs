//! HTTP request handlers for the control surface.

use std::sync::Arc;

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use monitor_store::Params;
use monitor_store::request::keys;
use tracing::info;

use crate::error::Result;
use crate::state::MonitorState;
use crate::types::{MutationResponse, NodeResponse};

/// Handle GET /reconfigure - replace a service's scrape and alerts.
pub async fn reconfigure(
    State(state): State<Arc<MonitorState>>,
    Query(params): Query<Params>,
) -> MutationResponse {
    info!(service = params.get(keys::SERVICE_NAME).map_or("", String::as_str), "processing reconfigure");
    state.reconfigure(&params).await
}

/// Handle POST /reconfigure - same as GET with form-encoded parameters.
pub async fn reconfigure_form(
    State(state): State<Arc<MonitorState>>,
    Form(params): Form<Params>,
) -> MutationResponse {
    info!(service = params.get(keys::SERVICE_NAME).map_or("", String::as_str), "processing reconfigure");
    state.reconfigure(&params).await
}

/// Handle DELETE /remove - drop a service's scrape and non-persistent alerts.
pub async fn remove(
    State(state): State<Arc<MonitorState>>,
    Query(params): Query<Params>,
) -> MutationResponse {
    let service_name = params.get(keys::SERVICE_NAME).map_or("", String::as_str);
    info!(service = %service_name, "processing remove");
    state.remove(service_name).await
}

/// Handle GET /node/reconfigure - store a node's labels.
pub async fn reconfigure_node(
    State(state): State<Arc<MonitorState>>,
    Query(params): Query<Params>,
) -> Result<NodeResponse> {
    state.reconfigure_node(&params).await
}

/// Handle DELETE /node/remove - drop a node's labels.
pub async fn remove_node(
    State(state): State<Arc<MonitorState>>,
    Query(params): Query<Params>,
) -> Result<NodeResponse> {
    state.remove_node(&params).await
}

/// Handle GET /ping and the catch-all route.
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "application/json")])
}
