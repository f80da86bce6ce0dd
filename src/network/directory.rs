//! Candidate node directory
//!
//! Holds the ordered list of REST gateways the supervisor may connect to.
//! Seeded from configuration, optionally refreshed from a node-list service.

use std::time::Duration;

use serde::Deserialize;

use crate::error::WalletError;
use crate::network::client::NodeClient;
use crate::network::properties::{NetworkIdentifier, NetworkProperties};

const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct NodeDirectory {
    network: NetworkIdentifier,
    nodes: Vec<String>,
    directory_url: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeEntryDto {
    #[serde(default)]
    api_status: Option<ApiStatusDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiStatusDto {
    #[serde(default)]
    rest_gateway_url: String,
    #[serde(default)]
    is_available: bool,
}

impl NodeDirectory {
    pub fn new(
        network: NetworkIdentifier,
        seed_nodes: Vec<String>,
        directory_url: Option<String>,
    ) -> Self {
        Self {
            network,
            nodes: seed_nodes
                .into_iter()
                .map(|n| n.trim_end_matches('/').to_string())
                .collect(),
            directory_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn network(&self) -> NetworkIdentifier {
        self.network
    }

    /// Current candidate list, in selection order.
    pub fn candidates(&self) -> &[String] {
        &self.nodes
    }

    /// Re-fetch the candidate list from the directory service. A missing
    /// directory URL is a no-op; an unreachable directory is the caller's
    /// signal that the network itself is down.
    pub async fn refresh(&mut self) -> Result<(), WalletError> {
        let url = match &self.directory_url {
            Some(url) => url.clone(),
            None => return Ok(()),
        };

        let entries: Vec<NodeEntryDto> = self
            .client
            .get(&url)
            .timeout(DIRECTORY_TIMEOUT)
            .send()
            .await
            .map_err(|e| WalletError::Network(format!("node directory {} unreachable: {}", url, e)))?
            .json()
            .await
            .map_err(|e| {
                WalletError::Network(format!("node directory {} returned invalid JSON: {}", url, e))
            })?;

        let fresh: Vec<String> = entries
            .into_iter()
            .filter_map(|entry| entry.api_status)
            .filter(|status| status.is_available && !status.rest_gateway_url.is_empty())
            .map(|status| status.rest_gateway_url.trim_end_matches('/').to_string())
            .collect();

        if fresh.is_empty() {
            log::warn!("⚠️ Node directory {} returned no available nodes, keeping current list", url);
            return Ok(());
        }

        log::info!("📡 Node directory refresh: {} candidate nodes", fresh.len());
        self.nodes = fresh;
        Ok(())
    }

    /// Probe one node: reachable, and on the expected network. Returns the
    /// full property snapshot on success.
    pub async fn probe(&self, url: &str) -> Result<NetworkProperties, WalletError> {
        let client = NodeClient::new(url);
        let info = client.node_info().await?;
        if info.network_identifier != self.network.value() {
            return Err(WalletError::NetworkMismatch(format!(
                "node {} reports network byte {}, expected {}",
                url,
                info.network_identifier,
                self.network.value()
            )));
        }
        client.network_properties(self.network).await
    }
}
