//! Startup against a local stand-in for the service inventory.

use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use monitor_config::RenderSettings;
use monitor_server::testing::RecordingRunner;
use monitor_server::{ServerConfig, ServerError, bootstrap};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

async fn spawn_inventory(nodes_ok: bool) -> SocketAddr {
    let services = || async {
        Json(json!([
            {
                "serviceName": "web",
                "scrapePort": "8080",
                "alertName": "mem",
                "alertIf": "@service_mem_limit:0.9",
                "alertName.1": "down",
                "alertIf.1": "up == 0"
            },
            { "serviceName": "worker" }
        ]))
    };
    let nodes = move || async move {
        if nodes_ok {
            Ok(Json(json!([
                { "id": "n1", "labels": { "aws_region": "eu", "secret": "x" } }
            ])))
        } else {
            Err::<Json<Value>, StatusCode>(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };

    let app = Router::new()
        .route("/v1/docker-flow-swarm-listener/get-services", get(services))
        .route("/v1/docker-flow-swarm-listener/get-nodes", get(nodes));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config(dir: &TempDir, addr: SocketAddr) -> ServerConfig {
    ServerConfig::default()
        .with_render(RenderSettings::in_dir(dir.path()))
        .with_node_target_label("aws_region")
        .with_inventory_url(format!("http://{addr}"))
        .with_inventory_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn inventory_services_and_nodes_are_loaded() {
    let dir = TempDir::new().unwrap();
    let addr = spawn_inventory(true).await;

    let server = bootstrap(config(&dir, addr), &BTreeMap::new(), Arc::new(RecordingRunner::default()))
        .await
        .unwrap();

    let state = server.state();
    let store = state.store().lock().await;
    assert_eq!(store.scrapes().len(), 1);
    assert_eq!(store.alerts().len(), 2);
    assert_eq!(store.node_labels()["n1"].len(), 1);
    drop(store);

    let rules = fs::read_to_string(dir.path().join("alert.rules")).unwrap();
    assert!(rules.contains("web_mem"));
    assert!(rules.contains("container_memory_usage_bytes"));
}

#[tokio::test]
async fn failing_nodes_endpoint_is_tolerated() {
    let dir = TempDir::new().unwrap();
    let addr = spawn_inventory(false).await;

    let server = bootstrap(config(&dir, addr), &BTreeMap::new(), Arc::new(RecordingRunner::default()))
        .await
        .unwrap();

    assert!(server.state().node_labels().await.is_empty());
    assert!(dir.path().join("prometheus.yml").exists());
}

#[tokio::test]
async fn env_scrapes_join_inventory_scrapes() {
    let dir = TempDir::new().unwrap();
    let addr = spawn_inventory(true).await;
    let env = BTreeMap::from([
        ("SERVICE_NAME_1".to_string(), "node-exporter".to_string()),
        ("SCRAPE_PORT_1".to_string(), "9100".to_string()),
    ]);

    let server = bootstrap(config(&dir, addr), &env, Arc::new(RecordingRunner::default()))
        .await
        .unwrap();

    let state = server.state();
    let names: Vec<String> = state.store().lock().await.scrapes().keys().cloned().collect();
    assert_eq!(names, vec!["node-exporter", "web"]);
}

#[tokio::test]
async fn missing_inventory_fails_startup() {
    let dir = TempDir::new().unwrap();
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = unused.local_addr().unwrap();
    drop(unused);

    let result = bootstrap(config(&dir, addr), &BTreeMap::new(), Arc::new(RecordingRunner::default())).await;

    assert!(matches!(result, Err(ServerError::Inventory { .. })));
}
