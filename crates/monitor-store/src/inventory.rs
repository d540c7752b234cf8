//! Startup state from the service inventory and the environment.

use std::collections::BTreeMap;

use monitor_alerts::ShortcutTable;
use monitor_config::{DiscoveryMode, ScrapeTarget};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, StoreError};
use crate::request::{Params, decode_scrape};
use crate::store::ReconciliationStore;

/// Prefix of environment variables naming a scraped service.
pub const SERVICE_NAME_PREFIX: &str = "SERVICE_NAME_";
/// Prefix of environment variables holding a scrape port.
pub const SCRAPE_PORT_PREFIX: &str = "SCRAPE_PORT_";

/// A node as reported by the inventory service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryNode {
    /// Node ID.
    pub id: String,
    /// All labels of the node.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Reads `SERVICE_NAME_N`/`SCRAPE_PORT_N` pairs into static scrapes.
///
/// Pairs are numbered from 1; a pair with an empty name or port is skipped.
///
/// # Errors
///
/// Returns an error if the variables do not come in pairs or a port is not a
/// number.
pub fn scrapes_from_env(vars: &BTreeMap<String, String>) -> Result<Vec<ScrapeTarget>> {
    let relevant: BTreeMap<&str, &str> = vars
        .iter()
        .filter(|(k, _)| k.starts_with(SERVICE_NAME_PREFIX) || k.starts_with(SCRAPE_PORT_PREFIX))
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    if relevant.len() % 2 != 0 {
        return Err(StoreError::UnpairedScrapeVariables {
            count: relevant.len(),
        });
    }

    let mut scrapes = Vec::new();
    for i in 1..=relevant.len() / 2 {
        let name_key = format!("{SERVICE_NAME_PREFIX}{i}");
        let port_key = format!("{SCRAPE_PORT_PREFIX}{i}");
        let name = relevant.get(name_key.as_str()).copied().unwrap_or_default();
        let port = relevant.get(port_key.as_str()).copied().unwrap_or_default();
        if name.is_empty() || port.is_empty() {
            continue;
        }

        let port = port.trim().parse().map_err(|_| StoreError::InvalidPort {
            key: port_key.clone(),
            value: port.to_string(),
        })?;
        scrapes.push(ScrapeTarget::new(name, port).with_discovery_mode(DiscoveryMode::Static));
    }
    Ok(scrapes)
}

impl ReconciliationStore {
    /// Loads scrapes and alerts from inventory service rows.
    ///
    /// Each row is decoded like a reconfigure request, without dropping
    /// existing alerts first. Returns the number of rows read.
    pub fn ingest_services(
        &mut self,
        rows: &[Params],
        shortcuts: &ShortcutTable,
        scrape_label_names: &[String],
    ) -> usize {
        for row in rows {
            self.upsert_scrape(decode_scrape(row, scrape_label_names));
            self.upsert_alerts(row, shortcuts);
        }
        info!(
            services = rows.len(),
            scrapes = self.scrapes().len(),
            alerts = self.alerts().len(),
            "loaded services from inventory"
        );
        rows.len()
    }

    /// Loads node labels from the inventory, keeping only allowed names.
    pub fn ingest_nodes(&mut self, nodes: &[InventoryNode], allowed: &[String]) -> usize {
        let mut count = 0;
        for node in nodes {
            if node.id.is_empty() {
                warn!("skipping inventory node without id");
                continue;
            }
            self.upsert_node_labels(&node.id, allowed, &node.labels);
            count += 1;
        }
        count
    }

    /// Adds the scrapes declared through environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the variables are malformed; nothing is added then.
    pub fn add_env_scrapes(&mut self, vars: &BTreeMap<String, String>) -> Result<usize> {
        let scrapes = scrapes_from_env(vars)?;
        let count = scrapes.len();
        for scrape in scrapes {
            self.upsert_scrape(scrape);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn env_pairs_become_static_scrapes() {
        let scrapes = scrapes_from_env(&vars(&[
            ("SERVICE_NAME_1", "node-exporter"),
            ("SCRAPE_PORT_1", "9100"),
            ("SERVICE_NAME_2", "cadvisor"),
            ("SCRAPE_PORT_2", "8080"),
            ("UNRELATED", "x"),
        ]))
        .unwrap();

        assert_eq!(scrapes.len(), 2);
        assert_eq!(scrapes[0].service_name, "node-exporter");
        assert_eq!(scrapes[0].port, 9100);
        assert_eq!(scrapes[0].discovery_mode, DiscoveryMode::Static);
        assert_eq!(scrapes[1].service_name, "cadvisor");
    }

    #[test_case(&[("SERVICE_NAME_1", "a")] ; "missing port")]
    #[test_case(&[("SERVICE_NAME_1", "a"), ("SCRAPE_PORT_1", "1"), ("SCRAPE_PORT_2", "2")] ; "three variables")]
    fn odd_count_is_error(pairs: &[(&str, &str)]) {
        assert!(matches!(
            scrapes_from_env(&vars(pairs)),
            Err(StoreError::UnpairedScrapeVariables { .. })
        ));
    }

    #[test]
    fn non_numeric_port_is_error() {
        let err = scrapes_from_env(&vars(&[("SERVICE_NAME_1", "a"), ("SCRAPE_PORT_1", "http")]))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPort { .. }));
    }

    #[test]
    fn mismatched_indexes_skipped() {
        let scrapes =
            scrapes_from_env(&vars(&[("SERVICE_NAME_1", "a"), ("SCRAPE_PORT_2", "80")])).unwrap();
        assert!(scrapes.is_empty());
    }

    #[test]
    fn ingest_services_rows() {
        let mut store = ReconciliationStore::new();
        let rows = vec![
            vars(&[
                ("serviceName", "web"),
                ("scrapePort", "8080"),
                ("alertName", "down"),
                ("alertIf", "up == 0"),
                ("alertName.1", "mem"),
                ("alertIf.1", "@service_mem_limit:0.9"),
            ]),
            vars(&[("serviceName", "no-port")]),
        ];

        let read = store.ingest_services(&rows, &ShortcutTable::builtin().unwrap(), &[]);

        assert_eq!(read, 2);
        assert_eq!(store.scrapes().len(), 1);
        assert_eq!(store.alerts().len(), 2);
        assert!(store.alerts()["web_mem"].expression.ends_with("> 0.9"));
    }

    #[test]
    fn ingest_nodes_filters_labels() {
        let mut store = ReconciliationStore::new();
        let nodes: Vec<InventoryNode> = serde_json::from_str(
            r#"[{"id":"n1","labels":{"role":"db","secret":"x"}},{"id":"","labels":{}},{"id":"n2"}]"#,
        )
        .unwrap();

        let count = store.ingest_nodes(&nodes, &["role".to_string()]);

        assert_eq!(count, 2);
        assert_eq!(store.node_labels()["n1"].len(), 1);
        assert!(store.node_labels()["n2"].is_empty());
    }

    #[test]
    fn add_env_scrapes_stores_them() {
        let mut store = ReconciliationStore::new();
        let added = store
            .add_env_scrapes(&vars(&[("SERVICE_NAME_1", "a"), ("SCRAPE_PORT_1", "1")]))
            .unwrap();
        assert_eq!(added, 1);
        assert!(store.scrapes().contains_key("a"));
    }
}
