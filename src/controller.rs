//! Wallet controller
//!
//! The single entry point applications talk to. Owns the supervisor, the
//! confirmation monitor for the selected account, the state store, and the
//! transaction orchestrator, and keeps them consistent across network and
//! account switches. Lifecycle is explicit: `new`, `load_cache`, `start`,
//! work, `shutdown`.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::account::{Account, AccountInfo, HarvestingStatus};
use crate::config::ControllerConfig;
use crate::error::WalletError;
use crate::listener::{AccountScope, ConfirmationListener};
use crate::network::{
    ConnectionStatus, ConnectionSupervisor, NetworkIdentifier, NetworkProperties, NodeClient,
    NodeDirectory,
};
use crate::signing::{CosignatureSignedTransaction, SignedTransaction, SigningService};
use crate::store::{PersistentStorage, StoreIdentity, WalletStateStore};
use crate::transaction::{
    create_start_harvesting_transaction, create_stop_harvesting_transaction, harvesting_status,
    AnnounceOptions, StartHarvestingBundle, TransactionCommon, TransactionDescriptor,
    TransactionOrchestrator, TransactionSummary,
};

/// Fees are multiplier times serialized size; announcements estimate the
/// size at 1 KiB.
const ESTIMATED_TRANSACTION_SIZE: u64 = 1024;

pub struct WalletController {
    config: ControllerConfig,
    signing: Arc<dyn SigningService>,
    store: Arc<WalletStateStore>,
    orchestrator: TransactionOrchestrator,
    supervisor: Mutex<Option<crate::network::SupervisorHandle>>,
    monitor: Arc<Mutex<Option<ConfirmationListener>>>,
    wiring: Mutex<Option<JoinHandle<()>>>,
}

impl WalletController {
    pub fn new(
        config: ControllerConfig,
        signing: Arc<dyn SigningService>,
        storage: Arc<dyn PersistentStorage>,
    ) -> Self {
        let store = Arc::new(WalletStateStore::new(
            storage,
            config.network,
            config.max_latest_transactions,
        ));
        let orchestrator = TransactionOrchestrator::new(Arc::clone(&signing), config.lock_params());
        Self {
            config,
            signing,
            store,
            orchestrator,
            supervisor: Mutex::new(None),
            monitor: Arc::new(Mutex::new(None)),
            wiring: Mutex::new(None),
        }
    }

    /// Load the selected network's persisted state into memory.
    pub async fn load_cache(&self) -> Result<(), WalletError> {
        self.store.load_cache().await
    }

    /// Spawn the connection supervisor and the wiring that reacts to every
    /// successful connection.
    pub async fn start(&self) -> Result<(), WalletError> {
        let mut supervisor_slot = self.supervisor.lock().await;
        if supervisor_slot.is_some() {
            return Err(WalletError::InvalidState(
                "controller is already started".to_string(),
            ));
        }
        let network = self.store.selected_network().await;
        *supervisor_slot = Some(self.spawn_supervisor(network).await);
        Ok(())
    }

    async fn spawn_supervisor(&self, network: NetworkIdentifier) -> crate::network::SupervisorHandle {
        let directory = NodeDirectory::new(
            network,
            self.config.nodes(network),
            self.config.directory_url(network),
        );
        let mut supervisor = ConnectionSupervisor::new(directory, self.config.connection_interval);
        supervisor.set_initial_node(self.store.selected_node(network).await.map(|n| n.url));

        let (connected_tx, mut connected_rx) = mpsc::unbounded_channel::<NetworkProperties>();
        supervisor.set_connected_notifier(connected_tx);

        let store = Arc::clone(&self.store);
        let monitor = Arc::clone(&self.monitor);
        let wiring = tokio::spawn(async move {
            while let Some(properties) = connected_rx.recv().await {
                let network = properties.network_identifier;
                if let Err(e) = store.set_network_properties(network, properties.clone()).await {
                    log::warn!("⚠️ Failed to persist network properties: {}", e);
                }
                if let Err(e) = store.set_selected_node(network, &properties.node_url).await {
                    log::warn!("⚠️ Failed to persist selected node: {}", e);
                }
                // A dead monitor only degrades cache freshness; the next
                // connection event retries.
                if let Err(e) = Self::arm_monitor(&store, &monitor, &properties).await {
                    log::warn!("⚠️ Confirmation monitor not armed: {}", e);
                }
            }
        });

        let mut wiring_slot = self.wiring.lock().await;
        if let Some(old) = wiring_slot.replace(wiring) {
            old.abort();
        }
        supervisor.spawn()
    }

    /// Open (or re-open) the confirmation listener for the selected account
    /// and spawn the cache-refresh loop consuming its events.
    async fn arm_monitor(
        store: &Arc<WalletStateStore>,
        monitor: &Arc<Mutex<Option<ConfirmationListener>>>,
        properties: &NetworkProperties,
    ) -> Result<(), WalletError> {
        let account = match store.selected_account().await {
            Some(account) => account,
            None => {
                if let Some(mut stale) = monitor.lock().await.take() {
                    stale.close().await;
                }
                return Ok(());
            }
        };

        let scope = AccountScope::from(&account);
        let mut slot = monitor.lock().await;
        if let Some(listener) = slot.as_ref() {
            // Keep the live listener only while it still watches the right
            // account on the right node; an account switch re-opens it.
            if listener.node_url() == properties.node_url
                && listener.scope() == &scope
                && !listener.is_closed()
            {
                return Ok(());
            }
        }
        if let Some(mut stale) = slot.take() {
            stale.close().await;
        }

        let identity = store.current_identity().await;
        let client = NodeClient::new(&properties.node_url);
        let mut listener =
            ConfirmationListener::open(&properties.node_url, client.clone(), scope).await?;
        let confirmed = match listener.confirmed() {
            Ok(rx) => rx,
            Err(e) => {
                listener.close().await;
                return Err(e);
            }
        };
        let unconfirmed = match listener.unconfirmed() {
            Ok(rx) => rx,
            Err(e) => {
                listener.close().await;
                return Err(e);
            }
        };
        log::info!("📡 Monitoring {} on {}", account.address, properties.node_url);
        *slot = Some(listener);

        tokio::spawn(cache_refresh_loop(
            Arc::clone(store),
            client,
            properties.network_currency.mosaic_id.clone(),
            identity,
            account.address,
            confirmed,
            unconfirmed,
        ));
        Ok(())
    }

    pub async fn shutdown(&self) {
        if let Some(handle) = self.supervisor.lock().await.take() {
            handle.shutdown().await;
        }
        if let Some(wiring) = self.wiring.lock().await.take() {
            wiring.abort();
        }
        if let Some(mut listener) = self.monitor.lock().await.take() {
            listener.close().await;
        }
        log::info!("🧹 Wallet controller stopped");
    }

    // =======================================================================
    // Network and account selection
    // =======================================================================

    pub async fn select_network(&self, network: NetworkIdentifier) -> Result<(), WalletError> {
        self.store.select_network(network).await?;
        if let Some(mut listener) = self.monitor.lock().await.take() {
            listener.close().await;
        }
        let mut supervisor_slot = self.supervisor.lock().await;
        if let Some(old) = supervisor_slot.take() {
            old.shutdown().await;
            *supervisor_slot = Some(self.spawn_supervisor(network).await);
        }
        Ok(())
    }

    pub async fn select_account(&self, address: &str) -> Result<(), WalletError> {
        self.store.select_account(address).await?;
        // Swing the monitor over right away instead of waiting for the next
        // connection event.
        if let Some(properties) = self.current_properties().await {
            if let Err(e) = Self::arm_monitor(&self.store, &self.monitor, &properties).await {
                log::warn!("⚠️ Confirmation monitor not armed: {}", e);
            }
        }
        Ok(())
    }

    pub async fn add_account(&self, account: Account) -> Result<(), WalletError> {
        self.store.add_account(account).await
    }

    pub async fn remove_account(&self, address: &str) -> Result<(), WalletError> {
        self.store.remove_account(address).await
    }

    pub async fn accounts(&self) -> Vec<Account> {
        self.store.accounts().await
    }

    pub async fn selected_account(&self) -> Option<Account> {
        self.store.selected_account().await
    }

    pub async fn selected_network(&self) -> NetworkIdentifier {
        self.store.selected_network().await
    }

    // =======================================================================
    // Cached state and refresh
    // =======================================================================

    pub async fn account_info(&self, address: &str) -> Option<AccountInfo> {
        self.store.account_info(address).await
    }

    pub async fn latest_transactions(&self, address: &str) -> Vec<TransactionSummary> {
        self.store.latest_transactions(address).await
    }

    /// Fetch the selected account's on-chain state and commit it through the
    /// identity guard. `Ok(None)` when the chain does not know the account.
    pub async fn refresh_account_info(&self) -> Result<Option<AccountInfo>, WalletError> {
        let identity = self.store.current_identity().await;
        let address = match &identity.1 {
            Some(address) => address.clone(),
            None => {
                return Err(WalletError::InvalidState("no account selected".to_string()));
            }
        };
        let (client, properties) = self.connection().await?;
        let info = client
            .fetch_account_info(&address, &properties.network_currency.mosaic_id)
            .await?;
        if let Some(info) = info.clone() {
            self.store.commit_account_info(&identity, info).await?;
        }
        Ok(info)
    }

    /// Re-fetch the selected account's confirmed history and commit it
    /// through the identity guard.
    pub async fn refresh_latest_transactions(
        &self,
    ) -> Result<Vec<TransactionSummary>, WalletError> {
        let identity = self.store.current_identity().await;
        let address = match &identity.1 {
            Some(address) => address.clone(),
            None => {
                return Err(WalletError::InvalidState("no account selected".to_string()));
            }
        };
        let (client, _) = self.connection().await?;
        let transactions = client
            .confirmed_transactions_for(&address, self.config.max_latest_transactions as u32)
            .await?;
        self.store
            .commit_latest_transactions(&identity, transactions.clone())
            .await?;
        Ok(transactions)
    }

    // =======================================================================
    // Transactions
    // =======================================================================

    /// Deadline and fee fields for a new transaction signed by the selected
    /// account.
    pub async fn new_transaction_common(&self) -> Result<TransactionCommon, WalletError> {
        let account = self
            .selected_account()
            .await
            .ok_or_else(|| WalletError::InvalidState("no account selected".to_string()))?;
        let (_, properties) = self.connection().await?;
        Ok(self.transaction_common(&properties, &account.public_key))
    }

    fn transaction_common(
        &self,
        properties: &NetworkProperties,
        signer_public_key: &str,
    ) -> TransactionCommon {
        TransactionCommon {
            signer_public_key: signer_public_key.to_string(),
            max_fee: properties
                .transaction_fees
                .median_fee_multiplier
                .saturating_mul(ESTIMATED_TRANSACTION_SIZE),
            deadline: properties.deadline_from_now(self.config.transaction_lifetime),
        }
    }

    /// Sign and announce through the plain endpoint. Aggregate-bonded
    /// descriptors must go through [`announce_bonded`](Self::announce_bonded).
    pub async fn announce(
        &self,
        descriptor: &TransactionDescriptor,
        private_key: &str,
    ) -> Result<SignedTransaction, WalletError> {
        if descriptor.is_aggregate_bonded() {
            return Err(WalletError::InvalidTransactionType(
                "aggregate bonded transactions need the two-phase announce".to_string(),
            ));
        }
        let (client, properties) = self.connection().await?;
        self.orchestrator
            .sign_and_announce_transaction(
                &client,
                &properties,
                descriptor,
                false,
                private_key,
                AnnounceOptions::default(),
            )
            .await
    }

    /// Two-phase aggregate-bonded announce: hash lock, confirmation wait,
    /// then the partial endpoint.
    pub async fn announce_bonded(
        &self,
        descriptor: &TransactionDescriptor,
        private_key: &str,
        options: AnnounceOptions,
    ) -> Result<SignedTransaction, WalletError> {
        if !descriptor.is_aggregate_bonded() {
            return Err(WalletError::InvalidTransactionType(format!(
                "two-phase announce requires an aggregate bonded transaction, got {}",
                descriptor.type_name()
            )));
        }
        let (client, properties) = self.connection().await?;
        self.orchestrator
            .sign_and_announce_transaction(&client, &properties, descriptor, true, private_key, options)
            .await
    }

    pub async fn cosign(
        &self,
        descriptor: &TransactionDescriptor,
        private_key: &str,
    ) -> Result<CosignatureSignedTransaction, WalletError> {
        let (client, properties) = self.connection().await?;
        self.orchestrator
            .cosign_transaction(&client, &properties, descriptor, private_key)
            .await
    }

    // =======================================================================
    // Harvesting
    // =======================================================================

    /// Build, sign and announce the start-harvesting aggregate. Returns the
    /// generated key pairs alongside the announced transaction.
    pub async fn start_harvesting(
        &self,
        node_public_key: &str,
        private_key: &str,
    ) -> Result<(StartHarvestingBundle, SignedTransaction), WalletError> {
        let account = self
            .selected_account()
            .await
            .ok_or_else(|| WalletError::InvalidState("no account selected".to_string()))?;
        let (client, properties) = self.connection().await?;
        let linked_keys = client
            .fetch_account_info(&account.address, &properties.network_currency.mosaic_id)
            .await?
            .map(|info| info.linked_keys)
            .unwrap_or_default();

        let common = self.transaction_common(&properties, &account.public_key);
        let bundle = create_start_harvesting_transaction(
            self.signing.as_ref(),
            properties.network_identifier,
            &common,
            private_key,
            &linked_keys,
            node_public_key,
        )?;
        let signed = self
            .orchestrator
            .sign_and_announce_transaction(
                &client,
                &properties,
                &bundle.descriptor,
                false,
                private_key,
                AnnounceOptions::default(),
            )
            .await?;
        Ok((bundle, signed))
    }

    /// Unlink all supplemental keys. Fails when nothing is linked.
    pub async fn stop_harvesting(&self, private_key: &str) -> Result<SignedTransaction, WalletError> {
        let account = self
            .selected_account()
            .await
            .ok_or_else(|| WalletError::InvalidState("no account selected".to_string()))?;
        let (client, properties) = self.connection().await?;
        let linked_keys = client
            .fetch_account_info(&account.address, &properties.network_currency.mosaic_id)
            .await?
            .map(|info| info.linked_keys)
            .unwrap_or_default();

        let common = self.transaction_common(&properties, &account.public_key);
        let descriptor = create_stop_harvesting_transaction(&common, &linked_keys)?;
        self.orchestrator
            .sign_and_announce_transaction(
                &client,
                &properties,
                &descriptor,
                false,
                private_key,
                AnnounceOptions::default(),
            )
            .await
    }

    pub async fn harvesting_status(&self) -> Result<HarvestingStatus, WalletError> {
        let account = self
            .selected_account()
            .await
            .ok_or_else(|| WalletError::InvalidState("no account selected".to_string()))?;
        let (client, properties) = self.connection().await?;
        let linked_keys = client
            .fetch_account_info(&account.address, &properties.network_currency.mosaic_id)
            .await?
            .map(|info| info.linked_keys)
            .unwrap_or_default();
        harvesting_status(&client, &linked_keys).await
    }

    // =======================================================================
    // Connection
    // =======================================================================

    pub async fn connection_status(&self) -> ConnectionStatus {
        match self.supervisor.lock().await.as_ref() {
            Some(handle) => handle.status(),
            None => ConnectionStatus::Initial,
        }
    }

    pub async fn pin_node(&self, url: &str) -> Result<(), WalletError> {
        let slot = self.supervisor.lock().await;
        let handle = slot
            .as_ref()
            .ok_or_else(|| WalletError::InvalidState("controller is not started".to_string()))?;
        handle.pin_node(url);
        Ok(())
    }

    pub async fn clear_pinned_node(&self) -> Result<(), WalletError> {
        let slot = self.supervisor.lock().await;
        let handle = slot
            .as_ref()
            .ok_or_else(|| WalletError::InvalidState("controller is not started".to_string()))?;
        handle.clear_pinned_node();
        Ok(())
    }

    pub async fn reconnect(&self) -> Result<(), WalletError> {
        let slot = self.supervisor.lock().await;
        let handle = slot
            .as_ref()
            .ok_or_else(|| WalletError::InvalidState("controller is not started".to_string()))?;
        handle.reconnect();
        Ok(())
    }

    async fn current_properties(&self) -> Option<NetworkProperties> {
        match self.supervisor.lock().await.as_ref() {
            Some(handle) if handle.status() == ConnectionStatus::Connected => {
                handle.properties().await
            }
            _ => None,
        }
    }

    /// Client plus properties of the connected node, or `NotConnected`.
    async fn connection(&self) -> Result<(NodeClient, NetworkProperties), WalletError> {
        let properties = self.current_properties().await.ok_or_else(|| {
            WalletError::NotConnected("no node connection is available".to_string())
        })?;
        Ok((NodeClient::new(&properties.node_url), properties))
    }
}

/// Consume listener events for one account: every unconfirmed or confirmed
/// transaction lands in the latest list, and confirmations additionally
/// refresh the account info. All commits go through the identity guard.
async fn cache_refresh_loop(
    store: Arc<WalletStateStore>,
    client: NodeClient,
    currency_mosaic_id: String,
    identity: StoreIdentity,
    address: String,
    mut confirmed: mpsc::UnboundedReceiver<TransactionSummary>,
    mut unconfirmed: mpsc::UnboundedReceiver<TransactionSummary>,
) {
    loop {
        tokio::select! {
            event = confirmed.recv() => match event {
                Some(summary) => {
                    if let Err(e) = store.push_latest_transaction(&identity, summary).await {
                        log::warn!("⚠️ Failed to cache confirmed transaction: {}", e);
                    }
                    match client.fetch_account_info(&address, &currency_mosaic_id).await {
                        Ok(Some(info)) => {
                            if let Err(e) = store.commit_account_info(&identity, info).await {
                                log::warn!("⚠️ Failed to cache account info: {}", e);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => log::warn!("⚠️ Account info refresh failed: {}", e),
                    }
                }
                None => break,
            },
            event = unconfirmed.recv() => match event {
                Some(summary) => {
                    if let Err(e) = store.push_latest_transaction(&identity, summary).await {
                        log::warn!("⚠️ Failed to cache unconfirmed transaction: {}", e);
                    }
                }
                None => break,
            },
        }
    }
    log::debug!("Cache refresh loop for {} ended", address);
}
