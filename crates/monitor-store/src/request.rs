//! Decoding of mutation request parameters.
//!
//! Requests arrive as flat string maps, either from an HTTP query or form, or
//! from an inventory row. Alerts beyond the first are sent with a `.N`
//! suffix on every alert parameter (`alertName.1`, `alertIf.1`, ...).

use std::collections::BTreeMap;

use monitor_alerts::AlertRule;
use monitor_config::{DiscoveryMode, NodeTarget, ScrapeTarget};
use tracing::warn;

/// Flat request parameters.
pub type Params = BTreeMap<String, String>;

/// Highest `.N` suffix read for additional alerts.
pub const MAX_INDEXED_ALERTS: usize = 10;

/// Parameter names.
pub mod keys {
    /// Service name.
    pub const SERVICE_NAME: &str = "serviceName";
    /// Scrape port.
    pub const SCRAPE_PORT: &str = "scrapePort";
    /// Discovery mode.
    pub const SCRAPE_TYPE: &str = "scrapeType";
    /// Metrics path.
    pub const METRICS_PATH: &str = "metricsPath";
    /// Scrape interval.
    pub const SCRAPE_INTERVAL: &str = "scrapeInterval";
    /// Scrape timeout.
    pub const SCRAPE_TIMEOUT: &str = "scrapeTimeout";
    /// JSON list of nodes.
    pub const NODE_INFO: &str = "nodeInfo";
    /// Alert name.
    pub const ALERT_NAME: &str = "alertName";
    /// Alert expression.
    pub const ALERT_IF: &str = "alertIf";
    /// Alert pending duration.
    pub const ALERT_FOR: &str = "alertFor";
    /// Alert annotations as `k=v,k=v`.
    pub const ALERT_ANNOTATIONS: &str = "alertAnnotations";
    /// Alert labels as `k=v,k=v`.
    pub const ALERT_LABELS: &str = "alertLabels";
    /// Alert persistence flag.
    pub const ALERT_PERSISTENT: &str = "alertPersistent";
    /// Expected replica count.
    pub const REPLICAS: &str = "replicas";
    /// Node ID.
    pub const NODE_ID: &str = "id";
}

fn get<'a>(params: &'a Params, key: &str) -> &'a str {
    params.get(key).map_or("", String::as_str)
}

/// Parses `k=v,k=v` into a map. Entries without `=` are skipped.
#[must_use]
pub fn parse_kv_list(value: &str) -> BTreeMap<String, String> {
    value
        .split(',')
        .filter_map(|entry| entry.split_once('='))
        .filter(|(k, _)| !k.trim().is_empty())
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .collect()
}

/// Decodes the scrape part of a request.
///
/// Parameters named in `label_names` are copied into the scrape's static
/// labels. The result is not validated.
#[must_use]
pub fn decode_scrape(params: &Params, label_names: &[String]) -> ScrapeTarget {
    let mut scrape = ScrapeTarget::new(
        get(params, keys::SERVICE_NAME),
        get(params, keys::SCRAPE_PORT).trim().parse().unwrap_or(0),
    )
    .with_metrics_path(get(params, keys::METRICS_PATH))
    .with_interval(get(params, keys::SCRAPE_INTERVAL))
    .with_timeout(get(params, keys::SCRAPE_TIMEOUT))
    .with_discovery_mode(DiscoveryMode::parse(get(params, keys::SCRAPE_TYPE)));

    for name in label_names {
        if let Some(value) = params.get(name).filter(|v| !v.is_empty()) {
            scrape.extra_labels.insert(name.clone(), value.clone());
        }
    }

    let node_info = get(params, keys::NODE_INFO);
    if !node_info.is_empty() {
        match serde_json::from_str::<Vec<NodeTarget>>(node_info) {
            Ok(nodes) => scrape.nodes.extend(nodes),
            Err(e) => warn!(service = %scrape.service_name, error = %e, "ignoring malformed nodeInfo"),
        }
    }
    scrape
}

/// Decodes the alert with the given suffix (`""` or `".N"`).
///
/// Returns `None` when the request has no alert name for the suffix. The
/// result is neither expanded nor validated.
#[must_use]
pub fn decode_alert(params: &Params, suffix: &str) -> Option<AlertRule> {
    let field = |name: &str| get(params, &format!("{name}{suffix}")).to_string();
    let alert_name = field(keys::ALERT_NAME);
    if alert_name.is_empty() {
        return None;
    }

    let mut alert = AlertRule::new(get(params, keys::SERVICE_NAME), alert_name, field(keys::ALERT_IF))
        .with_for(field(keys::ALERT_FOR))
        .with_replicas(get(params, keys::REPLICAS).trim().parse().unwrap_or(0))
        .persistent(field(keys::ALERT_PERSISTENT).trim().parse().unwrap_or(false));
    alert.annotations = parse_kv_list(&field(keys::ALERT_ANNOTATIONS));
    alert.labels = parse_kv_list(&field(keys::ALERT_LABELS));
    Some(alert)
}

/// Returns the suffixes tried for a request: the primary alert, then `.1`
/// through `.10`.
pub fn alert_suffixes() -> impl Iterator<Item = String> {
    std::iter::once(String::new()).chain((1..=MAX_INDEXED_ALERTS).map(|i| format!(".{i}")))
}

/// Decodes the node label part of a node request.
///
/// Only parameters named in `allowed` are kept.
#[must_use]
pub fn decode_node_labels(params: &Params, allowed: &[String]) -> BTreeMap<String, String> {
    allowed
        .iter()
        .filter_map(|name| params.get(name).map(|value| (name.clone(), value.clone())))
        .collect()
}
