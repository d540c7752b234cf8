//! The reconciliation store.

use std::collections::BTreeMap;

use monitor_alerts::{AlertRule, ShortcutTable, service_prefix};
use monitor_config::{DiscoveryMode, NodeLabels, ScrapeTarget};
use serde::Serialize;
use tracing::{debug, info};

use crate::request::{self, Params, alert_suffixes, decode_alert, decode_scrape};

/// What a reconfigure or remove call changed, as reported back to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Mutation {
    /// Alerts added, or removed for a removal.
    pub alerts: Vec<AlertRule>,
    /// The submitted or removed scrape; the zero value when there was none.
    pub scrape: ScrapeTarget,
}

/// Authoritative state of scrapes, alerts and node labels.
///
/// Scrapes are keyed by service name, alerts by their formatted key and
/// node labels by node ID. Callers serialize access; every method assumes
/// it has exclusive use of the store.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationStore {
    scrapes: BTreeMap<String, ScrapeTarget>,
    alerts: BTreeMap<String, AlertRule>,
    node_labels: NodeLabels,
}

impl ReconciliationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the scrapes keyed by service name.
    #[must_use]
    pub const fn scrapes(&self) -> &BTreeMap<String, ScrapeTarget> {
        &self.scrapes
    }

    /// Returns the alerts keyed by formatted key.
    #[must_use]
    pub const fn alerts(&self) -> &BTreeMap<String, AlertRule> {
        &self.alerts
    }

    /// Returns the node labels keyed by node ID.
    #[must_use]
    pub const fn node_labels(&self) -> &NodeLabels {
        &self.node_labels
    }

    /// Stores a scrape, replacing any scrape with the same service name.
    ///
    /// Invalid scrapes are ignored and `None` is returned. Scrapes with nodes
    /// always use file discovery.
    pub fn upsert_scrape(&mut self, mut target: ScrapeTarget) -> Option<&ScrapeTarget> {
        if !target.is_valid() {
            debug!(service = %target.service_name, port = target.port, "ignoring invalid scrape");
            return None;
        }
        if target.has_nodes() {
            target.discovery_mode = DiscoveryMode::FileSd;
        }

        info!(
            service = %target.service_name,
            port = target.port,
            mode = %target.discovery_mode,
            nodes = target.nodes.len(),
            "adding scrape"
        );
        let name = target.service_name.clone();
        self.scrapes.insert(name.clone(), target);
        self.scrapes.get(&name)
    }

    /// Removes a scrape and returns it, or the zero value if it was absent.
    pub fn remove_scrape(&mut self, service_name: &str) -> ScrapeTarget {
        match self.scrapes.remove(service_name) {
            Some(target) => {
                info!(service = %service_name, "removed scrape");
                target
            }
            None => ScrapeTarget::default(),
        }
    }

    /// Expands, validates and stores one alert.
    ///
    /// Returns the stored alert, or `None` if it was rejected.
    pub fn upsert_alert(&mut self, mut alert: AlertRule, shortcuts: &ShortcutTable) -> Option<AlertRule> {
        shortcuts.expand(&mut alert);
        alert.refresh_key();
        if !alert.is_valid() {
            debug!(service = %alert.service_name, alert = %alert.alert_name, "ignoring invalid alert");
            return None;
        }

        info!(service = %alert.service_name, alert = %alert.alert_name, key = %alert.formatted_key, "adding alert");
        self.alerts.insert(alert.formatted_key.clone(), alert.clone());
        Some(alert)
    }

    /// Stores the primary alert and the `.1` to `.10` alerts of a request.
    ///
    /// Suffixed alerts are read in order and reading stops at the first one
    /// that is missing or invalid. Returns the stored alerts.
    pub fn upsert_alerts(&mut self, params: &Params, shortcuts: &ShortcutTable) -> Vec<AlertRule> {
        let mut stored = Vec::new();
        for suffix in alert_suffixes() {
            let accepted = decode_alert(params, &suffix)
                .and_then(|alert| self.upsert_alert(alert, shortcuts));
            match accepted {
                Some(alert) => stored.push(alert),
                None if suffix.is_empty() => {}
                None => break,
            }
        }
        stored
    }

    /// Removes every alert of a service and returns them.
    ///
    /// Keys alone are ambiguous once names contain underscores, so the
    /// alert's own service name must match too. With `keep_persistent`,
    /// alerts marked persistent stay.
    pub fn delete_alerts_for_service(&mut self, service_name: &str, keep_persistent: bool) -> Vec<AlertRule> {
        let prefix = service_prefix(service_name);
        let doomed: Vec<String> = self
            .alerts
            .iter()
            .filter(|(key, alert)| {
                key.starts_with(&prefix)
                    && alert.service_name == service_name
                    && !(keep_persistent && alert.persistent)
            })
            .map(|(key, _)| key.clone())
            .collect();

        let removed: Vec<AlertRule> = doomed
            .iter()
            .filter_map(|key| self.alerts.remove(key))
            .collect();
        if !removed.is_empty() {
            info!(service = %service_name, count = removed.len(), keep_persistent, "removed alerts");
        }
        removed
    }

    /// Replaces a service's scrape and alerts from a reconfigure request.
    ///
    /// Existing alerts of the service are all dropped first, persistent or
    /// not. `scrape_label_names` selects request parameters copied into the
    /// scrape's labels.
    pub fn reconfigure(
        &mut self,
        params: &Params,
        shortcuts: &ShortcutTable,
        scrape_label_names: &[String],
    ) -> Mutation {
        let scrape = decode_scrape(params, scrape_label_names);
        let scrape = self.upsert_scrape(scrape.clone()).cloned().unwrap_or(scrape);
        let service_name = params
            .get(request::keys::SERVICE_NAME)
            .map_or("", String::as_str);

        self.delete_alerts_for_service(service_name, false);
        let alerts = self.upsert_alerts(params, shortcuts);
        Mutation { alerts, scrape }
    }

    /// Removes a service's scrape and its non-persistent alerts.
    pub fn remove_service(&mut self, service_name: &str) -> Mutation {
        let scrape = self.remove_scrape(service_name);
        let alerts = self.delete_alerts_for_service(service_name, true);
        Mutation { alerts, scrape }
    }

    /// Stores the allowed subset of `source` as the labels of a node.
    ///
    /// Returns the stored labels.
    pub fn upsert_node_labels(
        &mut self,
        node_id: &str,
        allowed: &[String],
        source: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let labels: BTreeMap<String, String> = allowed
            .iter()
            .filter_map(|name| source.get(name).map(|value| (name.clone(), value.clone())))
            .collect();
        info!(node = %node_id, labels = labels.len(), "updated node labels");
        self.node_labels.insert(node_id.to_string(), labels.clone());
        labels
    }

    /// Removes a node's labels and returns them.
    pub fn remove_node_labels(&mut self, node_id: &str) -> BTreeMap<String, String> {
        let labels = self.node_labels.remove(node_id).unwrap_or_default();
        info!(node = %node_id, "removed node labels");
        labels
    }
}
