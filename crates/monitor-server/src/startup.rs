//! Startup: shortcut tables, initial store contents and the first render.

use std::collections::BTreeMap;
use std::sync::Arc;

use monitor_alerts::ShortcutTable;
use monitor_store::ReconciliationStore;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::inventory::InventoryClient;
use crate::process::ProcessRunner;
use crate::server::MonitorServer;
use crate::state::MonitorState;

/// Load the built-in shortcuts merged with overrides from the secrets dir.
///
/// # Errors
///
/// Returns error if an override file cannot be read or parsed.
pub fn load_shortcuts(config: &ServerConfig) -> Result<ShortcutTable> {
    let mut shortcuts = ShortcutTable::builtin()?;
    if let Some(dir) = &config.render.secrets_dir {
        let overrides = shortcuts.load_dir(dir)?;
        if overrides > 0 {
            info!(dir = %dir.display(), overrides, "merged shortcut overrides");
        }
    }
    info!(shortcuts = shortcuts.len(), "loaded shortcuts");
    Ok(shortcuts)
}

/// Build the server with its startup state and render the first config.
///
/// Services come from the inventory when one is configured, then static
/// scrapes from `SERVICE_NAME_N`/`SCRAPE_PORT_N` in `env`. Failing to fetch
/// services is fatal; failing to fetch nodes only loses their labels.
///
/// # Errors
///
/// Returns error if shortcuts, services or env scrapes cannot be loaded, or
/// the first render fails.
pub async fn bootstrap(
    config: ServerConfig,
    env: &BTreeMap<String, String>,
    runner: Arc<dyn ProcessRunner>,
) -> Result<MonitorServer> {
    let shortcuts = load_shortcuts(&config)?;
    let mut store = ReconciliationStore::new();

    if let Some(address) = &config.inventory_url {
        let client = InventoryClient::new(address, config.inventory_timeout)?;
        info!(url = %client.base_url(), "requesting services from inventory");
        let services = client.services().await?;
        store.ingest_services(&services, &shortcuts, &config.scrape_target_labels);

        match client.nodes().await {
            Ok(nodes) => {
                store.ingest_nodes(&nodes, &config.node_target_labels);
            }
            Err(e) => warn!(error = %e, "continuing without node labels"),
        }
    }

    let added = store.add_env_scrapes(env)?;
    if added > 0 {
        info!(scrapes = added, "added scrapes from environment");
    }

    let state = MonitorState::with_store(config, shortcuts, runner, store);
    state.render().await?;
    Ok(MonitorServer::from_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;
    use monitor_config::RenderSettings;
    use std::fs;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> ServerConfig {
        ServerConfig::default()
            .with_render(RenderSettings::in_dir(dir.path()).with_secrets_dir(dir.path().join("secrets")))
    }

    #[test]
    fn overrides_replace_builtins() {
        let dir = TempDir::new().unwrap();
        let secrets = dir.path().join("secrets");
        fs::create_dir_all(&secrets).unwrap();
        fs::write(secrets.join("alertif-custom"), "service_mem_limit:\n  expanded: custom\n").unwrap();

        let shortcuts = load_shortcuts(&config_in(&dir)).unwrap();

        assert_eq!(shortcuts.get("service_mem_limit").unwrap().expression_template, "custom");
    }

    #[test]
    fn missing_secrets_dir_is_fine() {
        let dir = TempDir::new().unwrap();
        let shortcuts = load_shortcuts(&config_in(&dir)).unwrap();
        assert!(!shortcuts.is_empty());
    }

    #[tokio::test]
    async fn bootstrap_renders_env_scrapes() {
        let dir = TempDir::new().unwrap();
        let env = BTreeMap::from([
            ("SERVICE_NAME_1".to_string(), "node-exporter".to_string()),
            ("SCRAPE_PORT_1".to_string(), "9100".to_string()),
        ]);

        let server = bootstrap(config_in(&dir), &env, Arc::new(RecordingRunner::default()))
            .await
            .unwrap();

        let rendered = fs::read_to_string(dir.path().join("prometheus.yml")).unwrap();
        assert!(rendered.contains("node-exporter:9100"));
        assert_eq!(server.state().store().lock().await.scrapes().len(), 1);
    }

    #[tokio::test]
    async fn bootstrap_rejects_unpaired_env_scrapes() {
        let dir = TempDir::new().unwrap();
        let env = BTreeMap::from([("SERVICE_NAME_1".to_string(), "a".to_string())]);

        let result = bootstrap(config_in(&dir), &env, Arc::new(RecordingRunner::default())).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unreachable_inventory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir)
            .with_inventory_url("http://127.0.0.1:1")
            .with_inventory_timeout(std::time::Duration::from_millis(500));

        let result = bootstrap(config, &BTreeMap::new(), Arc::new(RecordingRunner::default())).await;

        assert!(matches!(result, Err(crate::error::ServerError::Inventory { .. })));
    }
}
