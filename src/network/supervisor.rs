//! Connection supervisor
//!
//! Owns the wallet's node connection as a periodic background job: probe the
//! pinned or current node first, fall back to auto-selection across the
//! directory, and publish status plus the connected node's properties.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::network::directory::NodeDirectory;
use crate::network::properties::{NetworkIdentifier, NetworkProperties};

/// Where the wallet stands with respect to its node connection. Only the
/// supervisor job transitions this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection attempt has completed yet.
    Initial,
    /// The current node answered and matches the configured network.
    Connected,
    /// The pinned or previously connected node stopped answering.
    FailedCurrentNode,
    /// Every candidate node failed; the directory itself was reachable.
    FailedAutoSelection,
    /// The node directory could not be reached at all.
    NoInternet,
}

#[derive(Debug)]
struct ConnectionState {
    status: watch::Sender<ConnectionStatus>,
    properties: RwLock<Option<NetworkProperties>>,
}

#[derive(Debug)]
enum SupervisorCommand {
    PinNode(String),
    ClearPinnedNode,
    Reconnect,
}

pub struct ConnectionSupervisor {
    network: NetworkIdentifier,
    directory: NodeDirectory,
    interval: std::time::Duration,
    current_node: Option<String>,
    pinned_node: Option<String>,
    state: Arc<ConnectionState>,
    connected_tx: Option<mpsc::UnboundedSender<NetworkProperties>>,
}

impl ConnectionSupervisor {
    pub fn new(directory: NodeDirectory, interval: std::time::Duration) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Initial);
        Self {
            network: directory.network(),
            directory,
            interval,
            current_node: None,
            pinned_node: None,
            state: Arc::new(ConnectionState {
                status,
                properties: RwLock::new(None),
            }),
            connected_tx: None,
        }
    }

    /// Seed the node tried first on startup, typically the last node the
    /// wallet was connected to.
    pub fn set_initial_node(&mut self, url: Option<String>) {
        self.current_node = url.map(|u| u.trim_end_matches('/').to_string());
    }

    /// Every successful connection pushes the fresh properties here.
    pub fn set_connected_notifier(&mut self, tx: mpsc::UnboundedSender<NetworkProperties>) {
        self.connected_tx = Some(tx);
    }

    /// Pin one node; auto-selection stays off until the pin is cleared.
    pub fn set_pinned_node(&mut self, url: Option<String>) {
        self.pinned_node = url.map(|u| u.trim_end_matches('/').to_string());
    }

    pub fn network(&self) -> NetworkIdentifier {
        self.network
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.state.status.borrow()
    }

    pub async fn properties(&self) -> Option<NetworkProperties> {
        self.state.properties.read().await.clone()
    }

    /// One pass of the connection algorithm. Probes pinned-or-current first,
    /// then auto-selects from the directory unless a node is pinned.
    pub async fn run_connection_job(&mut self) {
        let mut failed_node = None;

        let candidate = self.pinned_node.clone().or_else(|| self.current_node.clone());
        if let Some(url) = candidate {
            match self.directory.probe(&url).await {
                Ok(properties) => {
                    self.commit_connected(url, properties).await;
                    return;
                }
                Err(e) => {
                    log::warn!("⚠️ Node {} failed: {}", url, e);
                    self.state.status.send_replace(ConnectionStatus::FailedCurrentNode);
                    failed_node = Some(url);
                }
            }
        }

        if let Err(e) = self.directory.refresh().await {
            log::warn!("⚠️ Node directory unreachable: {}", e);
            self.state.status.send_replace(ConnectionStatus::NoInternet);
            return;
        }

        if self.pinned_node.is_some() {
            // The directory is reachable but a pinned node is never replaced
            // behind the user's back.
            return;
        }

        let candidates: Vec<String> = self
            .directory
            .candidates()
            .iter()
            .filter(|url| Some(url.as_str()) != failed_node.as_deref())
            .cloned()
            .collect();
        for url in candidates {
            match self.directory.probe(&url).await {
                Ok(properties) => {
                    log::info!("✅ Auto-selected node {}", url);
                    self.commit_connected(url, properties).await;
                    return;
                }
                Err(e) => log::debug!("Candidate {} skipped: {}", url, e),
            }
        }

        self.state.status.send_replace(ConnectionStatus::FailedAutoSelection);
    }

    async fn commit_connected(&mut self, url: String, properties: NetworkProperties) {
        self.current_node = Some(url.clone());
        *self.state.properties.write().await = Some(properties.clone());
        self.state.status.send_replace(ConnectionStatus::Connected);
        log::info!(
            "🌐 Connected to {} on {} at height {}",
            url,
            properties.network_identifier,
            properties.chain_height
        );
        if let Some(tx) = &self.connected_tx {
            let _ = tx.send(properties);
        }
    }

    /// Move the supervisor onto its own task. The job runs once immediately,
    /// then on every interval tick and on every command.
    pub fn spawn(mut self) -> SupervisorHandle {
        let token = CancellationToken::new();
        let state = Arc::clone(&self.state);
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();

        let loop_token = token.clone();
        let task = tokio::spawn(async move {
            self.run_connection_job().await;
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    command = command_rx.recv() => {
                        match command {
                            Some(SupervisorCommand::PinNode(url)) => {
                                log::info!("📌 Pinning node {}", url);
                                self.pinned_node = Some(url.trim_end_matches('/').to_string());
                            }
                            Some(SupervisorCommand::ClearPinnedNode) => {
                                self.pinned_node = None;
                            }
                            Some(SupervisorCommand::Reconnect) => {}
                            None => break,
                        }
                        self.run_connection_job().await;
                    }
                    _ = tokio::time::sleep(self.interval) => {
                        self.run_connection_job().await;
                    }
                }
            }
            log::info!("🧹 Connection supervisor stopped");
        });

        SupervisorHandle {
            token,
            task,
            state,
            commands: command_tx,
        }
    }
}

/// Handle to a running supervisor task.
pub struct SupervisorHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    state: Arc<ConnectionState>,
    commands: mpsc::UnboundedSender<SupervisorCommand>,
}

impl SupervisorHandle {
    pub fn status(&self) -> ConnectionStatus {
        *self.state.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.state.status.subscribe()
    }

    /// Properties of the node we are connected to; `None` before the first
    /// successful connection.
    pub async fn properties(&self) -> Option<NetworkProperties> {
        self.state.properties.read().await.clone()
    }

    /// Pin one node; auto-selection stays off until the pin is cleared.
    pub fn pin_node(&self, url: &str) {
        let _ = self.commands.send(SupervisorCommand::PinNode(url.to_string()));
    }

    pub fn clear_pinned_node(&self) {
        let _ = self.commands.send(SupervisorCommand::ClearPinnedNode);
    }

    /// Force a connection attempt now instead of waiting for the next tick.
    pub fn reconnect(&self) {
        let _ = self.commands.send(SupervisorCommand::Reconnect);
    }

    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.task.await;
    }
}
