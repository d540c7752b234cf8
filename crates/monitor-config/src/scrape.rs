//! Scrape target types.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Metrics path used when a scrape does not set one.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// How the daemon discovers the endpoints of a scrape target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoveryMode {
    /// DNS lookups of `tasks.<service>`.
    #[default]
    #[serde(rename = "dns_sd_configs")]
    Dns,
    /// A single static `<service>:<port>` target.
    #[serde(rename = "static_configs")]
    Static,
    /// Per-node targets listed in a generated JSON file.
    #[serde(rename = "file_sd_configs")]
    FileSd,
}

impl DiscoveryMode {
    /// Parses a `scrapeType` request value.
    ///
    /// Anything that is not a recognised mode falls back to DNS discovery.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "static_configs" | "static" => Self::Static,
            "file_sd_configs" | "file_sd" => Self::FileSd,
            _ => Self::Dns,
        }
    }

    /// Returns the config section name for this mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Dns => "dns_sd_configs",
            Self::Static => "static_configs",
            Self::FileSd => "file_sd_configs",
        }
    }
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node that runs a replica of a scraped service.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeTarget {
    /// Node hostname.
    pub name: String,
    /// Address the node's replica is reachable at.
    pub addr: String,
    /// Opaque node ID used to look up node labels.
    #[serde(default)]
    pub id: String,
}

impl NodeTarget {
    /// Creates a node target.
    #[must_use]
    pub fn new(name: impl Into<String>, addr: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            id: id.into(),
        }
    }
}

/// A service the daemon should scrape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeTarget {
    /// Unique service name, also the job name.
    #[serde(rename = "serviceName")]
    pub service_name: String,
    /// Port the metrics endpoint listens on.
    #[serde(rename = "scrapePort")]
    pub port: u16,
    /// HTTP path of the metrics endpoint.
    #[serde(rename = "metricsPath", skip_serializing_if = "String::is_empty")]
    pub metrics_path: String,
    /// Scrape interval override.
    #[serde(rename = "scrapeInterval", skip_serializing_if = "String::is_empty")]
    pub interval: String,
    /// Scrape timeout override.
    #[serde(rename = "scrapeTimeout", skip_serializing_if = "String::is_empty")]
    pub timeout: String,
    /// Discovery mode.
    #[serde(rename = "scrapeType")]
    pub discovery_mode: DiscoveryMode,
    /// Static labels attached to every target of this scrape.
    #[serde(rename = "scrapeLabels", skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_labels: BTreeMap<String, String>,
    /// Nodes running the service, for file-based discovery.
    #[serde(rename = "nodeInfo", skip_serializing_if = "BTreeSet::is_empty")]
    pub nodes: BTreeSet<NodeTarget>,
}

impl ScrapeTarget {
    /// Creates a scrape target with DNS discovery.
    #[must_use]
    pub fn new(service_name: impl Into<String>, port: u16) -> Self {
        Self {
            service_name: service_name.into(),
            port,
            ..Self::default()
        }
    }

    /// Sets the metrics path.
    #[must_use]
    pub fn with_metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = path.into();
        self
    }

    /// Sets the scrape interval.
    #[must_use]
    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }

    /// Sets the scrape timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Sets the discovery mode.
    #[must_use]
    pub const fn with_discovery_mode(mut self, mode: DiscoveryMode) -> Self {
        self.discovery_mode = mode;
        self
    }

    /// Adds a static label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_labels.insert(key.into(), value.into());
        self
    }

    /// Adds a node.
    #[must_use]
    pub fn with_node(mut self, node: NodeTarget) -> Self {
        self.nodes.insert(node);
        self
    }

    /// Returns true if the target has a usable name and a non-zero port.
    ///
    /// The name doubles as a file name under the side file directory, so
    /// path separators and leading dots are refused.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_safe_service_name(&self.service_name) && self.port > 0
    }

    /// Returns true if the target lists any nodes.
    #[must_use]
    pub fn has_nodes(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Returns the metrics path, falling back to [`DEFAULT_METRICS_PATH`].
    #[must_use]
    pub fn metrics_path_or_default(&self) -> &str {
        if self.metrics_path.is_empty() {
            DEFAULT_METRICS_PATH
        } else {
            &self.metrics_path
        }
    }
}

/// Returns true if `name` is non-empty and stays inside a directory when
/// used as a file name.
#[must_use]
pub fn is_safe_service_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\']) && !name.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("static_configs", DiscoveryMode::Static ; "static")]
    #[test_case("file_sd_configs", DiscoveryMode::FileSd ; "file sd")]
    #[test_case("dns_sd_configs", DiscoveryMode::Dns ; "dns")]
    #[test_case("", DiscoveryMode::Dns ; "empty")]
    #[test_case("bogus", DiscoveryMode::Dns ; "unknown")]
    fn discovery_mode_parse(input: &str, expected: DiscoveryMode) {
        assert_eq!(DiscoveryMode::parse(input), expected);
    }

    #[test_case("svc", 8080, true ; "valid")]
    #[test_case("", 8080, false ; "no name")]
    #[test_case("svc", 0, false ; "no port")]
    #[test_case("my-svc_v2.1", 80, true ; "dots and dashes")]
    #[test_case("../../escaped", 80, false ; "parent traversal")]
    #[test_case("a/b", 80, false ; "forward slash")]
    #[test_case("a\\b", 80, false ; "backslash")]
    #[test_case(".hidden", 80, false ; "leading dot")]
    #[test_case("..", 80, false ; "parent only")]
    #[test_case("a..b", 80, false ; "embedded parent")]
    fn validity(name: &str, port: u16, expected: bool) {
        assert_eq!(ScrapeTarget::new(name, port).is_valid(), expected);
    }

    #[test]
    fn metrics_path_default() {
        assert_eq!(ScrapeTarget::new("svc", 1).metrics_path_or_default(), "/metrics");
        assert_eq!(
            ScrapeTarget::new("svc", 1)
                .with_metrics_path("/stats")
                .metrics_path_or_default(),
            "/stats"
        );
    }

    #[test]
    fn zero_value_serializes() {
        let json = serde_json::to_value(ScrapeTarget::default()).unwrap();
        assert_eq!(json["serviceName"], "");
        assert_eq!(json["scrapePort"], 0);
        assert_eq!(json["scrapeType"], "dns_sd_configs");
        assert!(json.get("nodeInfo").is_none());
    }

    #[test]
    fn node_info_parses_from_json() {
        let nodes: BTreeSet<NodeTarget> = serde_json::from_str(
            r#"[{"name":"node-1","addr":"10.0.0.1","id":"a"},{"name":"node-2","addr":"10.0.0.2"}]"#,
        )
        .unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes.contains(&NodeTarget::new("node-2", "10.0.0.2", "")));
    }
}
