//! Client for the service inventory queried at startup.

use std::time::Duration;

use monitor_store::{InventoryNode, Params};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{Result, ServerError};

/// Port assumed when the inventory address has no scheme.
pub const DEFAULT_INVENTORY_PORT: u16 = 8080;

/// Path of the services listing.
pub const SERVICES_PATH: &str = "/v1/docker-flow-swarm-listener/get-services";

/// Path of the nodes listing.
pub const NODES_PATH: &str = "/v1/docker-flow-swarm-listener/get-nodes";

/// Turns an inventory address into a base URL.
///
/// A bare host gets `http://` and the default port.
#[must_use]
pub fn base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http") {
        address.to_string()
    } else {
        format!("http://{address}:{DEFAULT_INVENTORY_PORT}")
    }
}

/// HTTP client of the inventory service.
#[derive(Debug, Clone)]
pub struct InventoryClient {
    base_url: String,
    client: reqwest::Client,
}

impl InventoryClient {
    /// Create a client for `address` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(address: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        Ok(Self {
            base_url: base_url(address),
            client,
        })
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch every service as a flat parameter map.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body is not a list of maps.
    pub async fn services(&self) -> Result<Vec<Params>> {
        let services: Vec<Params> = self.get_json(SERVICES_PATH).await?;
        info!(count = services.len(), "fetched services from inventory");
        Ok(services)
    }

    /// Fetch every node with its labels.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body does not decode.
    pub async fn nodes(&self) -> Result<Vec<InventoryNode>> {
        let nodes: Vec<InventoryNode> = self.get_json(NODES_PATH).await?;
        info!(count = nodes.len(), "fetched nodes from inventory");
        Ok(nodes)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "requesting inventory");

        let failed = |reason: String| ServerError::Inventory {
            url: url.clone(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?
            .error_for_status()
            .map_err(|e| failed(e.to_string()))?;

        response.json::<T>().await.map_err(|e| failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("swarm-listener", "http://swarm-listener:8080" ; "bare host")]
    #[test_case("http://listener:9000", "http://listener:9000" ; "with scheme")]
    #[test_case("https://listener/", "https://listener" ; "trailing slash")]
    #[test_case(" listener ", "http://listener:8080" ; "whitespace")]
    fn base_urls(address: &str, expected: &str) {
        assert_eq!(base_url(address), expected);
    }

    #[tokio::test]
    async fn unreachable_inventory_is_an_error() {
        let client = InventoryClient::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let err = client.services().await.unwrap_err();

        assert!(matches!(err, ServerError::Inventory { .. }));
        assert!(err.to_string().contains(SERVICES_PATH));
    }
}
