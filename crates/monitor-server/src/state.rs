//! Shared state for the monitor server.

use std::collections::BTreeMap;
use std::sync::Arc;

use monitor_alerts::ShortcutTable;
use monitor_config::{ConfigRenderer, RenderSummary};
use monitor_store::{InventoryNode, Params, ReconciliationStore, request::keys};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::process::ProcessRunner;
use crate::types::{MutationResponse, NodeResponse};

/// Shared state for the monitor server.
///
/// Every mutation holds the store lock from decoding through the daemon
/// reload, so rendered files never mix two requests.
pub struct MonitorState {
    config: Arc<ServerConfig>,
    store: Mutex<ReconciliationStore>,
    shortcuts: ShortcutTable,
    renderer: ConfigRenderer,
    runner: Arc<dyn ProcessRunner>,
}

impl std::fmt::Debug for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorState")
            .field("config", &self.config)
            .field("shortcuts", &self.shortcuts.len())
            .finish_non_exhaustive()
    }
}

impl MonitorState {
    /// Create state with an empty store.
    pub fn new(config: ServerConfig, shortcuts: ShortcutTable, runner: Arc<dyn ProcessRunner>) -> Self {
        Self::with_store(config, shortcuts, runner, ReconciliationStore::new())
    }

    /// Create state around an already populated store.
    pub fn with_store(
        config: ServerConfig,
        shortcuts: ShortcutTable,
        runner: Arc<dyn ProcessRunner>,
        store: ReconciliationStore,
    ) -> Self {
        let renderer = ConfigRenderer::new(config.render.clone());
        Self {
            config: Arc::new(config),
            store: Mutex::new(store),
            shortcuts,
            renderer,
            runner,
        }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shortcut table.
    pub fn shortcuts(&self) -> &ShortcutTable {
        &self.shortcuts
    }

    /// Get the store lock.
    pub fn store(&self) -> &Mutex<ReconciliationStore> {
        &self.store
    }

    /// Get the daemon runner.
    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::clone(&self.runner)
    }

    /// Load services and nodes reported by the inventory.
    ///
    /// Returns the number of services read.
    pub async fn ingest_inventory(&self, services: &[Params], nodes: &[InventoryNode]) -> usize {
        let mut store = self.store.lock().await;
        let count = store.ingest_services(services, &self.shortcuts, &self.config.scrape_target_labels);
        store.ingest_nodes(nodes, &self.config.node_target_labels);
        count
    }

    /// Render the configuration from the current store without reloading.
    ///
    /// # Errors
    ///
    /// Returns error if a file cannot be written.
    pub async fn render(&self) -> Result<RenderSummary> {
        let store = self.store.lock().await;
        self.render_locked(&store)
    }

    fn render_locked(&self, store: &ReconciliationStore) -> Result<RenderSummary> {
        let summary = self
            .renderer
            .render(store.scrapes(), store.alerts(), store.node_labels())?;
        info!(
            scrape_jobs = summary.scrape_jobs,
            alert_rules = summary.alert_rules,
            file_sd_files = summary.file_sd_files.len(),
            removed_files = summary.removed_files.len(),
            "rendered configuration"
        );
        Ok(summary)
    }

    async fn apply_locked(&self, store: &ReconciliationStore) -> Result<()> {
        self.render_locked(store)?;
        self.runner.reload().await
    }

    /// Replace a service's scrape and alerts, render and reload.
    pub async fn reconfigure(&self, params: &Params) -> MutationResponse {
        let mut store = self.store.lock().await;
        let mutation = store.reconfigure(params, &self.shortcuts, &self.config.scrape_target_labels);
        info!(
            service = %mutation.scrape.service_name,
            alerts = mutation.alerts.len(),
            "reconfigured service"
        );

        let response = MutationResponse::ok(mutation);
        match self.apply_locked(&store).await {
            Ok(()) => response,
            Err(e) => {
                error!(error = %e, "reconfigure not applied");
                response.failed(e.to_string())
            }
        }
    }

    /// Remove a service's scrape and non-persistent alerts, render and reload.
    pub async fn remove(&self, service_name: &str) -> MutationResponse {
        let mut store = self.store.lock().await;
        let mutation = store.remove_service(service_name);
        info!(service = %service_name, alerts = mutation.alerts.len(), "removed service");

        let response = MutationResponse::ok(mutation);
        match self.apply_locked(&store).await {
            Ok(()) => response,
            Err(e) => {
                error!(error = %e, "remove not applied");
                response.failed(e.to_string())
            }
        }
    }

    /// Store a node's allowed labels, render and reload.
    ///
    /// # Errors
    ///
    /// Returns error if the request has no node ID.
    pub async fn reconfigure_node(&self, params: &Params) -> Result<NodeResponse> {
        let id = node_id(params)?;
        let mut store = self.store.lock().await;
        let labels = store.upsert_node_labels(id, &self.config.node_target_labels, params);

        let response = NodeResponse::ok(id, labels);
        Ok(match self.apply_locked(&store).await {
            Ok(()) => response,
            Err(e) => {
                error!(node = %id, error = %e, "node reconfigure not applied");
                response.failed(e.to_string())
            }
        })
    }

    /// Drop a node's labels, render and reload.
    ///
    /// # Errors
    ///
    /// Returns error if the request has no node ID.
    pub async fn remove_node(&self, params: &Params) -> Result<NodeResponse> {
        let id = node_id(params)?;
        let mut store = self.store.lock().await;
        let labels = store.remove_node_labels(id);

        let response = NodeResponse::ok(id, labels);
        Ok(match self.apply_locked(&store).await {
            Ok(()) => response,
            Err(e) => {
                error!(node = %id, error = %e, "node remove not applied");
                response.failed(e.to_string())
            }
        })
    }

    /// Snapshot of the stored node labels.
    pub async fn node_labels(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.store.lock().await.node_labels().clone()
    }
}

fn node_id(params: &Params) -> Result<&str> {
    match params.get(keys::NODE_ID).map(|id| id.trim()) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => {
            warn!("node request without id");
            Err(ServerError::MissingParameter(keys::NODE_ID))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;
    use monitor_config::RenderSettings;
    use tempfile::TempDir;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn make_state(dir: &TempDir, runner: Arc<RecordingRunner>) -> MonitorState {
        let config = ServerConfig::default()
            .with_render(RenderSettings::in_dir(dir.path()))
            .with_node_target_label("role");
        MonitorState::new(config, ShortcutTable::builtin().unwrap(), runner)
    }

    #[tokio::test]
    async fn reconfigure_renders_and_reloads() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let state = make_state(&dir, runner.clone());

        let response = state
            .reconfigure(&params(&[("serviceName", "web"), ("scrapePort", "8080")]))
            .await;

        assert_eq!(response.status, 200);
        assert_eq!(runner.reloads(), 1);
        let written =
            std::fs::read_to_string(&state.config().render.config_path).unwrap();
        assert!(written.contains("tasks.web"));
    }

    #[tokio::test]
    async fn reload_failure_keeps_state() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::failing());
        let state = make_state(&dir, runner.clone());

        let response = state
            .reconfigure(&params(&[("serviceName", "web"), ("scrapePort", "8080")]))
            .await;

        assert_eq!(response.status, 500);
        assert!(response.message.contains("reload"));
        assert!(state.store().lock().await.scrapes().contains_key("web"));
    }

    #[tokio::test]
    async fn node_id_is_required() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let state = make_state(&dir, runner.clone());

        let err = state.reconfigure_node(&params(&[("role", "db")])).await.unwrap_err();

        assert!(matches!(err, ServerError::MissingParameter("id")));
        assert_eq!(runner.reloads(), 0);
    }

    #[tokio::test]
    async fn node_labels_round_trip() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let state = make_state(&dir, runner.clone());

        let response = state
            .reconfigure_node(&params(&[("id", "n1"), ("role", "db"), ("secret", "x")]))
            .await
            .unwrap();
        assert_eq!(response.labels.len(), 1);
        assert_eq!(state.node_labels().await["n1"]["role"], "db");

        let response = state.remove_node(&params(&[("id", "n1")])).await.unwrap();
        assert_eq!(response.labels["role"], "db");
        assert!(state.node_labels().await.is_empty());
        assert_eq!(runner.reloads(), 2);
    }

    #[tokio::test]
    async fn ingest_inventory_filters_node_labels() {
        let dir = TempDir::new().unwrap();
        let state = make_state(&dir, Arc::new(RecordingRunner::default()));
        let nodes = vec![InventoryNode {
            id: "n1".to_string(),
            labels: BTreeMap::from([
                ("role".to_string(), "db".to_string()),
                ("other".to_string(), "x".to_string()),
            ]),
        }];

        let count = state
            .ingest_inventory(&[params(&[("serviceName", "web"), ("scrapePort", "80")])], &nodes)
            .await;

        assert_eq!(count, 1);
        assert_eq!(state.node_labels().await["n1"].len(), 1);
        let summary = state.render().await.unwrap();
        assert_eq!(summary.scrape_jobs, 1);
    }
}
