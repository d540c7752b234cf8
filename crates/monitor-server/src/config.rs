//! Monitor server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use monitor_config::RenderSettings;

/// Default time allowed for each inventory request.
pub const DEFAULT_INVENTORY_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the monitor server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
    /// Where and how configuration files are rendered.
    pub render: RenderSettings,
    /// Node label names accepted from node requests and the inventory.
    pub node_target_labels: Vec<String>,
    /// Request parameters copied into a scrape's labels.
    pub scrape_target_labels: Vec<String>,
    /// Base URL of the inventory service, if any.
    pub inventory_url: Option<String>,
    /// Timeout of each inventory request.
    pub inventory_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            render: RenderSettings::default(),
            node_target_labels: Vec::new(),
            scrape_target_labels: Vec::new(),
            inventory_url: None,
            inventory_timeout: DEFAULT_INVENTORY_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Create a configuration listening on the given address.
    #[must_use]
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Self::default()
        }
    }

    /// Set the render settings.
    #[must_use]
    pub fn with_render(mut self, render: RenderSettings) -> Self {
        self.render = render;
        self
    }

    /// Allow a node label name.
    #[must_use]
    pub fn with_node_target_label(mut self, name: impl Into<String>) -> Self {
        self.node_target_labels.push(name.into());
        self
    }

    /// Allow a scrape label parameter.
    #[must_use]
    pub fn with_scrape_target_label(mut self, name: impl Into<String>) -> Self {
        self.scrape_target_labels.push(name.into());
        self
    }

    /// Set the inventory service URL.
    #[must_use]
    pub fn with_inventory_url(mut self, url: impl Into<String>) -> Self {
        self.inventory_url = Some(url.into());
        self
    }

    /// Set the inventory request timeout.
    #[must_use]
    pub const fn with_inventory_timeout(mut self, timeout: Duration) -> Self {
        self.inventory_timeout = timeout;
        self
    }
}
