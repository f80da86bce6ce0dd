//! Transaction orchestrator
//!
//! Drives announcement flows end to end: plain sign-and-announce, the
//! two-phase aggregate-bonded commit (hash lock first, bonded second), and
//! cosigning a partial aggregate. The orchestrator never caches network
//! state; callers pass the current node client and properties in.

use std::sync::Arc;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::account::Mosaic;
use crate::error::WalletError;
use crate::listener::{AccountScope, ConfirmationListener};
use crate::network::{NetworkProperties, NodeClient};
use crate::signing::{CosignatureSignedTransaction, SignedTransaction, SigningService};
use crate::transaction::types::{TransactionCommon, TransactionDescriptor};

/// Funds locked alongside an aggregate-bonded announcement.
#[derive(Debug, Clone, Copy)]
pub struct HashLockParams {
    /// Deposit in absolute currency units.
    pub deposit: u64,
    /// Lock lifetime in blocks.
    pub duration: u64,
}

impl Default for HashLockParams {
    fn default() -> Self {
        Self {
            deposit: 10_000_000,
            duration: 480,
        }
    }
}

/// Knobs for a single announcement. `cancel` aborts the two-phase wait
/// early; plain announcements ignore it.
#[derive(Debug, Default)]
pub struct AnnounceOptions {
    pub cancel: Option<CancellationToken>,
}

pub struct TransactionOrchestrator {
    signing: Arc<dyn SigningService>,
    lock: HashLockParams,
}

impl TransactionOrchestrator {
    pub fn new(signing: Arc<dyn SigningService>, lock: HashLockParams) -> Self {
        Self { signing, lock }
    }

    pub fn signing(&self) -> &Arc<dyn SigningService> {
        &self.signing
    }

    pub fn sign_transaction(
        &self,
        properties: &NetworkProperties,
        descriptor: &TransactionDescriptor,
        private_key: &str,
    ) -> Result<SignedTransaction, WalletError> {
        self.signing.sign(properties, descriptor, private_key)
    }

    /// Sign and announce one transaction. Aggregate-bonded descriptors with
    /// `send_hash_lock` go through the two-phase commit; without it they are
    /// announced straight to the partial endpoint, which only works when the
    /// lock already exists on chain.
    pub async fn sign_and_announce_transaction(
        &self,
        client: &NodeClient,
        properties: &NetworkProperties,
        descriptor: &TransactionDescriptor,
        send_hash_lock: bool,
        private_key: &str,
        options: AnnounceOptions,
    ) -> Result<SignedTransaction, WalletError> {
        let signed = self.signing.sign(properties, descriptor, private_key)?;

        if descriptor.is_aggregate_bonded() {
            if send_hash_lock {
                self.announce_bonded_with_lock(client, properties, descriptor, &signed, private_key, options)
                    .await?;
            } else {
                client.announce_partial(&signed).await?;
            }
        } else {
            client.announce(&signed).await?;
        }
        Ok(signed)
    }

    /// Two-phase commit: lock funds, wait for the lock to confirm, then hand
    /// the bonded aggregate to the partial-transaction pool. The wait is
    /// bounded by the lock's own deadline and by `options.cancel`.
    async fn announce_bonded_with_lock(
        &self,
        client: &NodeClient,
        properties: &NetworkProperties,
        bonded: &TransactionDescriptor,
        signed_bonded: &SignedTransaction,
        private_key: &str,
        options: AnnounceOptions,
    ) -> Result<(), WalletError> {
        let bonded_common = bonded.common();
        let lock = TransactionDescriptor::HashLock {
            common: TransactionCommon {
                signer_public_key: bonded_common.signer_public_key.clone(),
                max_fee: bonded_common.max_fee,
                deadline: bonded_common.deadline,
            },
            mosaic: Mosaic {
                id: properties.network_currency.mosaic_id.clone(),
                amount: self.lock.deposit,
            },
            duration: self.lock.duration,
            target_hash: signed_bonded.hash.clone(),
        };
        let signed_lock = self.signing.sign(properties, &lock, private_key)?;

        // The listener must be up before the lock is announced, otherwise a
        // fast confirmation can slip past us.
        let scope = AccountScope {
            address: self
                .signing
                .derive_address(&bonded_common.signer_public_key, properties.network_identifier),
            public_key: bonded_common.signer_public_key.clone(),
        };
        let mut listener =
            ConfirmationListener::open(&properties.node_url, client.clone(), scope).await?;
        let mut confirmed = match listener.confirmed() {
            Ok(rx) => rx,
            Err(e) => {
                listener.close().await;
                return Err(e);
            }
        };

        if let Err(e) = client.announce(&signed_lock).await {
            listener.close().await;
            return Err(e);
        }
        log::info!(
            "🔒 Hash lock {} announced, waiting for confirmation",
            signed_lock.hash
        );

        let deadline = deadline_instant(properties.epoch_adjustment, bonded_common.deadline);
        let cancel = options.cancel.unwrap_or_default();
        let wait = async {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(WalletError::Cancelled(format!(
                            "hash lock {} wait cancelled",
                            signed_lock.hash
                        )));
                    }
                    _ = sleep_until(deadline) => {
                        return Err(WalletError::ConfirmationTimeout(format!(
                            "hash lock {} not confirmed before its deadline",
                            signed_lock.hash
                        )));
                    }
                    event = confirmed.recv() => {
                        match event {
                            Some(summary) if summary.hash.eq_ignore_ascii_case(&signed_lock.hash) => {
                                return Ok(());
                            }
                            Some(_) => continue,
                            None => {
                                return Err(WalletError::ListenerClosed(
                                    "connection lost while waiting for the hash lock".to_string(),
                                ));
                            }
                        }
                    }
                }
            }
        };
        let waited = wait.await;
        listener.close().await;
        waited?;

        log::info!("✅ Hash lock confirmed, announcing bonded {}", signed_bonded.hash);
        client.announce_partial(signed_bonded).await?;
        Ok(())
    }

    /// Cosign a partial aggregate-bonded transaction. Anything else is
    /// rejected before a single signing call is made.
    pub async fn cosign_transaction(
        &self,
        client: &NodeClient,
        properties: &NetworkProperties,
        descriptor: &TransactionDescriptor,
        private_key: &str,
    ) -> Result<CosignatureSignedTransaction, WalletError> {
        match descriptor {
            TransactionDescriptor::AggregateBonded {
                transaction_info: Some(_),
                ..
            } => {}
            TransactionDescriptor::AggregateBonded { .. } => {
                return Err(WalletError::InvalidState(
                    "partial transaction carries no hash to cosign".to_string(),
                ));
            }
            other => {
                return Err(WalletError::InvalidTransactionType(format!(
                    "cosigning requires an aggregate bonded transaction, got {}",
                    other.type_name()
                )));
            }
        }

        let cosignature = self.signing.cosign(properties, descriptor, private_key)?;
        client.announce_cosignature(&cosignature.dto).await?;
        Ok(cosignature)
    }
}

/// Translate a transaction deadline (milliseconds after the network epoch)
/// into a tokio instant. Deadlines already in the past collapse to "now".
fn deadline_instant(epoch_adjustment: u64, deadline: u64) -> Instant {
    let target_ms = epoch_adjustment.saturating_mul(1000).saturating_add(deadline);
    let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
    Instant::now() + std::time::Duration::from_millis(target_ms.saturating_sub(now_ms))
}
