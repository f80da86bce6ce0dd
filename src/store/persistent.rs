//! Persistent storage backends
//!
//! One JSON file per concern, one directory per network. `FileStorage` is
//! the production backend; `MemoryStorage` backs tests and throwaway
//! sessions with identical semantics. Missing files read back as empty
//! defaults so a fresh profile needs no setup step.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::account::{Account, AccountInfo};
use crate::error::StorageError;
use crate::network::{NetworkIdentifier, NetworkProperties};
use crate::transaction::TransactionSummary;

const ACCOUNTS_FILE: &str = "accounts.json";
const ACCOUNT_INFOS_FILE: &str = "account_infos.json";
const LATEST_TRANSACTIONS_FILE: &str = "latest_transactions.json";
const SELECTED_NODE_FILE: &str = "selected_node.json";
const NETWORK_PROPERTIES_FILE: &str = "network_properties.json";

/// Accounts of one network plus which of them is selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountsSnapshot {
    pub accounts: Vec<Account>,
    pub selected: Option<String>,
}

/// Last node the wallet was connected to on one network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedNode {
    pub url: String,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait PersistentStorage: Send + Sync {
    async fn load_accounts(&self, network: NetworkIdentifier)
        -> Result<AccountsSnapshot, StorageError>;
    async fn save_accounts(
        &self,
        network: NetworkIdentifier,
        snapshot: &AccountsSnapshot,
    ) -> Result<(), StorageError>;

    async fn load_account_infos(
        &self,
        network: NetworkIdentifier,
    ) -> Result<HashMap<String, AccountInfo>, StorageError>;
    async fn save_account_infos(
        &self,
        network: NetworkIdentifier,
        infos: &HashMap<String, AccountInfo>,
    ) -> Result<(), StorageError>;

    async fn load_latest_transactions(
        &self,
        network: NetworkIdentifier,
    ) -> Result<HashMap<String, Vec<TransactionSummary>>, StorageError>;
    async fn save_latest_transactions(
        &self,
        network: NetworkIdentifier,
        latest: &HashMap<String, Vec<TransactionSummary>>,
    ) -> Result<(), StorageError>;

    async fn load_selected_node(
        &self,
        network: NetworkIdentifier,
    ) -> Result<Option<SelectedNode>, StorageError>;
    async fn save_selected_node(
        &self,
        network: NetworkIdentifier,
        node: &SelectedNode,
    ) -> Result<(), StorageError>;

    async fn load_network_properties(
        &self,
        network: NetworkIdentifier,
    ) -> Result<Option<NetworkProperties>, StorageError>;
    async fn save_network_properties(
        &self,
        network: NetworkIdentifier,
        properties: &NetworkProperties,
    ) -> Result<(), StorageError>;
}

// ===========================================================================
// File-backed storage
// ===========================================================================

#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn network_dir(&self, network: NetworkIdentifier) -> PathBuf {
        self.base_path.join(network.name())
    }

    fn read_json<T: DeserializeOwned + Default>(
        &self,
        network: NetworkIdentifier,
        file: &str,
    ) -> Result<T, StorageError> {
        let path = self.network_dir(network).join(file);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn write_json<T: Serialize>(
        &self,
        network: NetworkIdentifier,
        file: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let dir = self.network_dir(network);
        fs::create_dir_all(&dir)?;
        let raw = serde_json::to_string_pretty(value)?;
        fs::write(dir.join(file), raw)?;
        Ok(())
    }
}

#[async_trait]
impl PersistentStorage for FileStorage {
    async fn load_accounts(
        &self,
        network: NetworkIdentifier,
    ) -> Result<AccountsSnapshot, StorageError> {
        self.read_json(network, ACCOUNTS_FILE)
    }

    async fn save_accounts(
        &self,
        network: NetworkIdentifier,
        snapshot: &AccountsSnapshot,
    ) -> Result<(), StorageError> {
        self.write_json(network, ACCOUNTS_FILE, snapshot)
    }

    async fn load_account_infos(
        &self,
        network: NetworkIdentifier,
    ) -> Result<HashMap<String, AccountInfo>, StorageError> {
        self.read_json(network, ACCOUNT_INFOS_FILE)
    }

    async fn save_account_infos(
        &self,
        network: NetworkIdentifier,
        infos: &HashMap<String, AccountInfo>,
    ) -> Result<(), StorageError> {
        self.write_json(network, ACCOUNT_INFOS_FILE, infos)
    }

    async fn load_latest_transactions(
        &self,
        network: NetworkIdentifier,
    ) -> Result<HashMap<String, Vec<TransactionSummary>>, StorageError> {
        self.read_json(network, LATEST_TRANSACTIONS_FILE)
    }

    async fn save_latest_transactions(
        &self,
        network: NetworkIdentifier,
        latest: &HashMap<String, Vec<TransactionSummary>>,
    ) -> Result<(), StorageError> {
        self.write_json(network, LATEST_TRANSACTIONS_FILE, latest)
    }

    async fn load_selected_node(
        &self,
        network: NetworkIdentifier,
    ) -> Result<Option<SelectedNode>, StorageError> {
        self.read_json(network, SELECTED_NODE_FILE)
    }

    async fn save_selected_node(
        &self,
        network: NetworkIdentifier,
        node: &SelectedNode,
    ) -> Result<(), StorageError> {
        self.write_json(network, SELECTED_NODE_FILE, node)
    }

    async fn load_network_properties(
        &self,
        network: NetworkIdentifier,
    ) -> Result<Option<NetworkProperties>, StorageError> {
        self.read_json(network, NETWORK_PROPERTIES_FILE)
    }

    async fn save_network_properties(
        &self,
        network: NetworkIdentifier,
        properties: &NetworkProperties,
    ) -> Result<(), StorageError> {
        self.write_json(network, NETWORK_PROPERTIES_FILE, properties)
    }
}

// ===========================================================================
// In-memory storage
// ===========================================================================

#[derive(Debug, Default)]
pub struct MemoryStorage {
    accounts: Mutex<HashMap<NetworkIdentifier, AccountsSnapshot>>,
    account_infos: Mutex<HashMap<NetworkIdentifier, HashMap<String, AccountInfo>>>,
    latest: Mutex<HashMap<NetworkIdentifier, HashMap<String, Vec<TransactionSummary>>>>,
    nodes: Mutex<HashMap<NetworkIdentifier, SelectedNode>>,
    properties: Mutex<HashMap<NetworkIdentifier, NetworkProperties>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistentStorage for MemoryStorage {
    async fn load_accounts(
        &self,
        network: NetworkIdentifier,
    ) -> Result<AccountsSnapshot, StorageError> {
        Ok(self.accounts.lock().await.get(&network).cloned().unwrap_or_default())
    }

    async fn save_accounts(
        &self,
        network: NetworkIdentifier,
        snapshot: &AccountsSnapshot,
    ) -> Result<(), StorageError> {
        self.accounts.lock().await.insert(network, snapshot.clone());
        Ok(())
    }

    async fn load_account_infos(
        &self,
        network: NetworkIdentifier,
    ) -> Result<HashMap<String, AccountInfo>, StorageError> {
        Ok(self.account_infos.lock().await.get(&network).cloned().unwrap_or_default())
    }

    async fn save_account_infos(
        &self,
        network: NetworkIdentifier,
        infos: &HashMap<String, AccountInfo>,
    ) -> Result<(), StorageError> {
        self.account_infos.lock().await.insert(network, infos.clone());
        Ok(())
    }

    async fn load_latest_transactions(
        &self,
        network: NetworkIdentifier,
    ) -> Result<HashMap<String, Vec<TransactionSummary>>, StorageError> {
        Ok(self.latest.lock().await.get(&network).cloned().unwrap_or_default())
    }

    async fn save_latest_transactions(
        &self,
        network: NetworkIdentifier,
        latest: &HashMap<String, Vec<TransactionSummary>>,
    ) -> Result<(), StorageError> {
        self.latest.lock().await.insert(network, latest.clone());
        Ok(())
    }

    async fn load_selected_node(
        &self,
        network: NetworkIdentifier,
    ) -> Result<Option<SelectedNode>, StorageError> {
        Ok(self.nodes.lock().await.get(&network).cloned())
    }

    async fn save_selected_node(
        &self,
        network: NetworkIdentifier,
        node: &SelectedNode,
    ) -> Result<(), StorageError> {
        self.nodes.lock().await.insert(network, node.clone());
        Ok(())
    }

    async fn load_network_properties(
        &self,
        network: NetworkIdentifier,
    ) -> Result<Option<NetworkProperties>, StorageError> {
        Ok(self.properties.lock().await.get(&network).cloned())
    }

    async fn save_network_properties(
        &self,
        network: NetworkIdentifier,
        properties: &NetworkProperties,
    ) -> Result<(), StorageError> {
        self.properties.lock().await.insert(network, properties.clone());
        Ok(())
    }
}
