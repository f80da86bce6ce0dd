//! Wallet state store
//!
//! In-memory caches keyed by network, mirrored to persistent storage on
//! every mutation. Selected pointers move only through the explicit select
//! operations, and results of async work are committed through an identity
//! guard: if the wallet switched network or account while the work ran, the
//! stale result is discarded instead of overwriting fresh state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::account::{Account, AccountInfo};
use crate::error::WalletError;
use crate::network::{NetworkIdentifier, NetworkProperties};
use crate::store::persistent::{AccountsSnapshot, PersistentStorage, SelectedNode};
use crate::transaction::TransactionSummary;

/// What the wallet pointed at when an async operation started. Compared
/// against the live pointers before its result is committed.
pub type StoreIdentity = (NetworkIdentifier, Option<String>);

#[derive(Default)]
struct StoreInner {
    accounts: HashMap<NetworkIdentifier, Vec<Account>>,
    selected_accounts: HashMap<NetworkIdentifier, Option<String>>,
    account_infos: HashMap<NetworkIdentifier, HashMap<String, AccountInfo>>,
    latest_transactions: HashMap<NetworkIdentifier, HashMap<String, Vec<TransactionSummary>>>,
    network_properties: HashMap<NetworkIdentifier, NetworkProperties>,
    selected_nodes: HashMap<NetworkIdentifier, SelectedNode>,
    loaded: HashSet<NetworkIdentifier>,
}

pub struct WalletStateStore {
    storage: Arc<dyn PersistentStorage>,
    selected_network: RwLock<NetworkIdentifier>,
    inner: RwLock<StoreInner>,
    max_latest: usize,
}

impl WalletStateStore {
    pub fn new(
        storage: Arc<dyn PersistentStorage>,
        network: NetworkIdentifier,
        max_latest: usize,
    ) -> Self {
        Self {
            storage,
            selected_network: RwLock::new(network),
            inner: RwLock::new(StoreInner::default()),
            max_latest,
        }
    }

    /// Pull the selected network's state out of storage. Idempotent; other
    /// networks load lazily when selected.
    pub async fn load_cache(&self) -> Result<(), WalletError> {
        let network = *self.selected_network.read().await;
        self.ensure_loaded(network).await
    }

    async fn ensure_loaded(&self, network: NetworkIdentifier) -> Result<(), WalletError> {
        if self.inner.read().await.loaded.contains(&network) {
            return Ok(());
        }

        let snapshot = self.storage.load_accounts(network).await?;
        let infos = self.storage.load_account_infos(network).await?;
        let latest = self.storage.load_latest_transactions(network).await?;
        let node = self.storage.load_selected_node(network).await?;
        let properties = self.storage.load_network_properties(network).await?;

        let mut inner = self.inner.write().await;
        // A concurrent load may have won the race; first writer wins.
        if inner.loaded.insert(network) {
            log::info!(
                "📁 Loaded {} cache: {} accounts",
                network,
                snapshot.accounts.len()
            );
            inner.accounts.insert(network, snapshot.accounts);
            inner.selected_accounts.insert(network, snapshot.selected);
            inner.account_infos.insert(network, infos);
            inner.latest_transactions.insert(network, latest);
            if let Some(node) = node {
                inner.selected_nodes.insert(network, node);
            }
            if let Some(properties) = properties {
                inner.network_properties.insert(network, properties);
            }
        }
        Ok(())
    }

    // =======================================================================
    // Selection
    // =======================================================================

    pub async fn selected_network(&self) -> NetworkIdentifier {
        *self.selected_network.read().await
    }

    pub async fn select_network(&self, network: NetworkIdentifier) -> Result<(), WalletError> {
        self.ensure_loaded(network).await?;
        *self.selected_network.write().await = network;
        Ok(())
    }

    pub async fn select_account(&self, address: &str) -> Result<(), WalletError> {
        let network = self.selected_network().await;
        self.ensure_loaded(network).await?;

        let snapshot = {
            let mut inner = self.inner.write().await;
            let known = inner
                .accounts
                .get(&network)
                .map(|accounts| accounts.iter().any(|a| a.address.eq_ignore_ascii_case(address)))
                .unwrap_or(false);
            if !known {
                return Err(WalletError::AccountNotFound(format!(
                    "{} is not part of the {} wallet",
                    address, network
                )));
            }
            inner
                .selected_accounts
                .insert(network, Some(address.to_string()));
            accounts_snapshot(&inner, network)
        };
        self.storage.save_accounts(network, &snapshot).await?;
        Ok(())
    }

    /// Network plus selected account, captured before async work starts.
    pub async fn current_identity(&self) -> StoreIdentity {
        let network = self.selected_network().await;
        let selected = self
            .inner
            .read()
            .await
            .selected_accounts
            .get(&network)
            .cloned()
            .flatten();
        (network, selected)
    }

    // =======================================================================
    // Accounts
    // =======================================================================

    pub async fn add_account(&self, account: Account) -> Result<(), WalletError> {
        let network = self.selected_network().await;
        self.ensure_loaded(network).await?;

        let snapshot = {
            let mut inner = self.inner.write().await;
            let accounts = inner.accounts.entry(network).or_default();
            if accounts
                .iter()
                .any(|a| a.address.eq_ignore_ascii_case(&account.address))
            {
                return Err(WalletError::InvalidState(format!(
                    "account {} already exists",
                    account.address
                )));
            }
            let first = accounts.is_empty();
            let address = account.address.clone();
            accounts.push(account);
            if first {
                inner.selected_accounts.insert(network, Some(address));
            }
            accounts_snapshot(&inner, network)
        };
        self.storage.save_accounts(network, &snapshot).await?;
        Ok(())
    }

    pub async fn remove_account(&self, address: &str) -> Result<(), WalletError> {
        let network = self.selected_network().await;
        self.ensure_loaded(network).await?;

        let (snapshot, infos, latest) = {
            let mut inner = self.inner.write().await;
            let accounts = inner.accounts.entry(network).or_default();
            let before = accounts.len();
            accounts.retain(|a| !a.address.eq_ignore_ascii_case(address));
            if accounts.len() == before {
                return Err(WalletError::AccountNotFound(format!(
                    "{} is not part of the {} wallet",
                    address, network
                )));
            }

            let selected = inner.selected_accounts.entry(network).or_default();
            if selected
                .as_deref()
                .map(|s| s.eq_ignore_ascii_case(address))
                .unwrap_or(false)
            {
                *selected = None;
            }
            inner
                .account_infos
                .entry(network)
                .or_default()
                .retain(|key, _| !key.eq_ignore_ascii_case(address));
            inner
                .latest_transactions
                .entry(network)
                .or_default()
                .retain(|key, _| !key.eq_ignore_ascii_case(address));

            (
                accounts_snapshot(&inner, network),
                inner.account_infos.get(&network).cloned().unwrap_or_default(),
                inner
                    .latest_transactions
                    .get(&network)
                    .cloned()
                    .unwrap_or_default(),
            )
        };
        self.storage.save_accounts(network, &snapshot).await?;
        self.storage.save_account_infos(network, &infos).await?;
        self.storage.save_latest_transactions(network, &latest).await?;
        Ok(())
    }

    pub async fn accounts(&self) -> Vec<Account> {
        let network = self.selected_network().await;
        self.inner
            .read()
            .await
            .accounts
            .get(&network)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn selected_account(&self) -> Option<Account> {
        let network = self.selected_network().await;
        let inner = self.inner.read().await;
        let selected = inner.selected_accounts.get(&network)?.as_deref()?;
        inner
            .accounts
            .get(&network)?
            .iter()
            .find(|a| a.address.eq_ignore_ascii_case(selected))
            .cloned()
    }

    // =======================================================================
    // Guarded commits for async results
    // =======================================================================

    /// Commit a fetched account info. Returns `Ok(false)` without touching
    /// anything when the wallet moved on while the fetch ran.
    pub async fn commit_account_info(
        &self,
        identity: &StoreIdentity,
        info: AccountInfo,
    ) -> Result<bool, WalletError> {
        if !self.identity_matches(identity).await {
            log::debug!("Discarding stale account info for {}", info.address);
            return Ok(false);
        }
        let network = identity.0;
        let infos = {
            let mut inner = self.inner.write().await;
            inner
                .account_infos
                .entry(network)
                .or_default()
                .insert(info.address.clone(), info);
            inner.account_infos.get(&network).cloned().unwrap_or_default()
        };
        self.storage.save_account_infos(network, &infos).await?;
        Ok(true)
    }

    /// Prepend one transaction to the selected account's latest list,
    /// deduplicated by hash and capped.
    pub async fn push_latest_transaction(
        &self,
        identity: &StoreIdentity,
        summary: TransactionSummary,
    ) -> Result<bool, WalletError> {
        if !self.identity_matches(identity).await {
            log::debug!("Discarding stale transaction {}", summary.hash);
            return Ok(false);
        }
        let address = match &identity.1 {
            Some(address) => address.clone(),
            None => return Ok(false),
        };
        let network = identity.0;
        let latest = {
            let mut inner = self.inner.write().await;
            let list = inner
                .latest_transactions
                .entry(network)
                .or_default()
                .entry(address)
                .or_default();
            list.retain(|t| !t.hash.eq_ignore_ascii_case(&summary.hash));
            list.insert(0, summary);
            list.truncate(self.max_latest);
            inner
                .latest_transactions
                .get(&network)
                .cloned()
                .unwrap_or_default()
        };
        self.storage.save_latest_transactions(network, &latest).await?;
        Ok(true)
    }

    /// Replace the selected account's latest list wholesale.
    pub async fn commit_latest_transactions(
        &self,
        identity: &StoreIdentity,
        mut transactions: Vec<TransactionSummary>,
    ) -> Result<bool, WalletError> {
        if !self.identity_matches(identity).await {
            log::debug!("Discarding stale transaction list");
            return Ok(false);
        }
        let address = match &identity.1 {
            Some(address) => address.clone(),
            None => return Ok(false),
        };
        let network = identity.0;
        transactions.truncate(self.max_latest);
        let latest = {
            let mut inner = self.inner.write().await;
            inner
                .latest_transactions
                .entry(network)
                .or_default()
                .insert(address, transactions);
            inner
                .latest_transactions
                .get(&network)
                .cloned()
                .unwrap_or_default()
        };
        self.storage.save_latest_transactions(network, &latest).await?;
        Ok(true)
    }

    async fn identity_matches(&self, identity: &StoreIdentity) -> bool {
        self.current_identity().await == *identity
    }

    pub async fn account_info(&self, address: &str) -> Option<AccountInfo> {
        let network = self.selected_network().await;
        self.inner
            .read()
            .await
            .account_infos
            .get(&network)?
            .get(address)
            .cloned()
    }

    pub async fn latest_transactions(&self, address: &str) -> Vec<TransactionSummary> {
        let network = self.selected_network().await;
        self.inner
            .read()
            .await
            .latest_transactions
            .get(&network)
            .and_then(|map| map.get(address))
            .cloned()
            .unwrap_or_default()
    }

    // =======================================================================
    // Node and network properties
    // =======================================================================

    /// Keyed by network explicitly, so no identity guard applies.
    pub async fn set_selected_node(
        &self,
        network: NetworkIdentifier,
        url: &str,
    ) -> Result<(), WalletError> {
        let node = SelectedNode {
            url: url.trim_end_matches('/').to_string(),
            updated_at: Utc::now(),
        };
        self.inner
            .write()
            .await
            .selected_nodes
            .insert(network, node.clone());
        self.storage.save_selected_node(network, &node).await?;
        Ok(())
    }

    pub async fn selected_node(&self, network: NetworkIdentifier) -> Option<SelectedNode> {
        self.inner.read().await.selected_nodes.get(&network).cloned()
    }

    pub async fn set_network_properties(
        &self,
        network: NetworkIdentifier,
        properties: NetworkProperties,
    ) -> Result<(), WalletError> {
        self.inner
            .write()
            .await
            .network_properties
            .insert(network, properties.clone());
        self.storage.save_network_properties(network, &properties).await?;
        Ok(())
    }

    pub async fn network_properties(&self, network: NetworkIdentifier) -> Option<NetworkProperties> {
        self.inner
            .read()
            .await
            .network_properties
            .get(&network)
            .cloned()
    }
}

fn accounts_snapshot(inner: &StoreInner, network: NetworkIdentifier) -> AccountsSnapshot {
    AccountsSnapshot {
        accounts: inner.accounts.get(&network).cloned().unwrap_or_default(),
        selected: inner
            .selected_accounts
            .get(&network)
            .cloned()
            .flatten(),
    }
}
