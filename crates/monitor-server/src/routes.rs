//! Route configuration for the control surface.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers::{ping, reconfigure, reconfigure_form, reconfigure_node, remove, remove_node};
use crate::state::MonitorState;

/// Prefix of every control route.
pub const API_PREFIX: &str = "/v1/docker-flow-monitor";

fn api(path: &str) -> String {
    format!("{API_PREFIX}{path}")
}

/// Create the control surface router.
pub fn create_router(state: Arc<MonitorState>) -> Router {
    Router::new()
        .route(&api("/reconfigure"), get(reconfigure).post(reconfigure_form))
        .route(&api("/remove"), get(remove).delete(remove))
        .route(&api("/node/reconfigure"), get(reconfigure_node).put(reconfigure_node))
        .route(&api("/node/remove"), get(remove_node).delete(remove_node))
        .route(&api("/ping"), get(ping))
        .route(&api("/"), get(ping))
        .route("/", get(ping))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::testing::RecordingRunner;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use monitor_alerts::ShortcutTable;
    use monitor_config::RenderSettings;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn make_test_state(dir: &TempDir, runner: Arc<RecordingRunner>) -> Arc<MonitorState> {
        let config = ServerConfig::default()
            .with_render(RenderSettings::in_dir(dir.path()))
            .with_node_target_label("aws_region");
        Arc::new(MonitorState::new(config, ShortcutTable::builtin().unwrap(), runner))
    }

    async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_ping_endpoint() {
        let dir = TempDir::new().unwrap();
        let app = create_router(make_test_state(&dir, Arc::new(RecordingRunner::default())));

        let (status, body) = send(app, Method::GET, "/v1/docker-flow-monitor/ping").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn test_catch_all_endpoint() {
        let dir = TempDir::new().unwrap();
        let app = create_router(make_test_state(&dir, Arc::new(RecordingRunner::default())));

        let (status, _) = send(app, Method::GET, "/v1/docker-flow-monitor/").await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reconfigure_with_shortcut() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let app = create_router(make_test_state(&dir, runner.clone()));

        let (status, body) = send(
            app,
            Method::GET,
            "/v1/docker-flow-monitor/reconfigure?serviceName=my-service&scrapePort=1234\
             &alertName=my-alert&alertIf=@service_mem_limit:0.8&alertFor=my-for",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], 200);
        assert_eq!(body["scrape"]["serviceName"], "my-service");
        assert_eq!(body["scrape"]["scrapePort"], 1234);

        let alert = &body["alerts"][0];
        assert_eq!(alert["alertNameFormatted"], "myservice_myalert");
        assert_eq!(alert["alertFor"], "my-for");
        assert!(alert["alertIf"].as_str().unwrap().ends_with("> 0.8"));
        assert_eq!(alert["alertLabels"]["receiver"], "system");
        assert_eq!(alert["alertLabels"]["service"], "my-service");
        assert_eq!(runner.reloads(), 1);
    }

    #[tokio::test]
    async fn test_reconfigure_form_post() {
        let dir = TempDir::new().unwrap();
        let app = create_router(make_test_state(&dir, Arc::new(RecordingRunner::default())));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/v1/docker-flow-monitor/reconfigure")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("serviceName=web&scrapePort=8080&scrapeType=static_configs"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["scrape"]["scrapeType"], "static_configs");
    }

    #[tokio::test]
    async fn test_reload_failure_is_500() {
        let dir = TempDir::new().unwrap();
        let app = create_router(make_test_state(&dir, Arc::new(RecordingRunner::failing())));

        let (status, body) = send(
            app,
            Method::GET,
            "/v1/docker-flow-monitor/reconfigure?serviceName=web&scrapePort=80",
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], 500);
        assert!(body["message"].as_str().unwrap().contains("simulated failure"));
        assert_eq!(body["scrape"]["serviceName"], "web");
    }

    #[tokio::test]
    async fn test_remove_unknown_service() {
        let dir = TempDir::new().unwrap();
        let app = create_router(make_test_state(&dir, Arc::new(RecordingRunner::default())));

        let (status, body) = send(
            app,
            Method::DELETE,
            "/v1/docker-flow-monitor/remove?serviceName=ghost",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], 200);
        assert!(body["alerts"].as_array().unwrap().is_empty());
        assert_eq!(body["scrape"]["serviceName"], "");
        assert_eq!(body["scrape"]["scrapePort"], 0);
    }

    #[tokio::test]
    async fn test_node_reconfigure_requires_id() {
        let dir = TempDir::new().unwrap();
        let app = create_router(make_test_state(&dir, Arc::new(RecordingRunner::default())));

        let (status, body) = send(
            app,
            Method::GET,
            "/v1/docker-flow-monitor/node/reconfigure?aws_region=us-east",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_node_remove_requires_id() {
        let dir = TempDir::new().unwrap();
        let app = create_router(make_test_state(&dir, Arc::new(RecordingRunner::default())));

        let (status, _) = send(app, Method::DELETE, "/v1/docker-flow-monitor/node/remove").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_node_reconfigure_filters_labels() {
        let dir = TempDir::new().unwrap();
        let app = create_router(make_test_state(&dir, Arc::new(RecordingRunner::default())));

        let (status, body) = send(
            app,
            Method::GET,
            "/v1/docker-flow-monitor/node/reconfigure?id=n1&aws_region=us-east&secret=x",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "n1");
        assert_eq!(body["labels"]["aws_region"], "us-east");
        assert!(body["labels"].get("secret").is_none());
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let dir = TempDir::new().unwrap();
        let app = create_router(make_test_state(&dir, Arc::new(RecordingRunner::default())));

        let (status, _) = send(app, Method::GET, "/v1/unknown").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
