//! Delegated harvesting flows
//!
//! Start and stop are both single aggregate-complete transactions. Start
//! unlinks whatever supplemental keys are already in place, links the fresh
//! VRF and remote keys plus the node key, and ships the encrypted delegation
//! request to the node. Stop only unlinks.

use crate::account::{HarvestingStatus, LinkedKeys};
use crate::error::WalletError;
use crate::network::{NetworkIdentifier, NodeClient};
use crate::signing::{KeyPair, SigningService};
use crate::transaction::types::{LinkAction, TransactionCommon, TransactionDescriptor};

/// Everything `start` produces. The generated key pairs must be linked to
/// the account by the caller once the aggregate confirms.
#[derive(Debug, Clone)]
pub struct StartHarvestingBundle {
    pub descriptor: TransactionDescriptor,
    pub remote_key_pair: KeyPair,
    pub vrf_key_pair: KeyPair,
}

pub fn create_start_harvesting_transaction(
    signing: &dyn SigningService,
    network: NetworkIdentifier,
    common: &TransactionCommon,
    account_private_key: &str,
    linked_keys: &LinkedKeys,
    node_public_key: &str,
) -> Result<StartHarvestingBundle, WalletError> {
    let mut inner = unlink_transactions(common, linked_keys);

    let vrf_key_pair = signing.generate_key_pair()?;
    let remote_key_pair = signing.generate_key_pair()?;

    inner.push(TransactionDescriptor::VrfKeyLink {
        common: common.clone(),
        linked_public_key: vrf_key_pair.public_key.clone(),
        action: LinkAction::Link,
    });
    inner.push(TransactionDescriptor::AccountKeyLink {
        common: common.clone(),
        linked_public_key: remote_key_pair.public_key.clone(),
        action: LinkAction::Link,
    });
    inner.push(TransactionDescriptor::NodeKeyLink {
        common: common.clone(),
        linked_public_key: node_public_key.to_string(),
        action: LinkAction::Link,
    });

    // The delegation request rides in a transfer to the node itself; the
    // node detects it by the message's marker prefix.
    let message = signing.encode_delegation_message(
        account_private_key,
        node_public_key,
        &remote_key_pair.private_key,
        &vrf_key_pair.private_key,
    )?;
    inner.push(TransactionDescriptor::Transfer {
        common: common.clone(),
        recipient_address: signing.derive_address(node_public_key, network),
        mosaics: Vec::new(),
        message: Some(message),
    });

    Ok(StartHarvestingBundle {
        descriptor: TransactionDescriptor::AggregateComplete {
            common: common.clone(),
            inner,
        },
        remote_key_pair,
        vrf_key_pair,
    })
}

pub fn create_stop_harvesting_transaction(
    common: &TransactionCommon,
    linked_keys: &LinkedKeys,
) -> Result<TransactionDescriptor, WalletError> {
    if !linked_keys.any_linked() {
        return Err(WalletError::InvalidState(
            "no supplemental keys are linked to this account".to_string(),
        ));
    }
    Ok(TransactionDescriptor::AggregateComplete {
        common: common.clone(),
        inner: unlink_transactions(common, linked_keys),
    })
}

/// Unlinks in a fixed order: VRF, then account, then node.
fn unlink_transactions(
    common: &TransactionCommon,
    linked_keys: &LinkedKeys,
) -> Vec<TransactionDescriptor> {
    let mut inner = Vec::new();
    if let Some(key) = &linked_keys.vrf_public_key {
        inner.push(TransactionDescriptor::VrfKeyLink {
            common: common.clone(),
            linked_public_key: key.clone(),
            action: LinkAction::Unlink,
        });
    }
    if let Some(key) = &linked_keys.linked_public_key {
        inner.push(TransactionDescriptor::AccountKeyLink {
            common: common.clone(),
            linked_public_key: key.clone(),
            action: LinkAction::Unlink,
        });
    }
    if let Some(key) = &linked_keys.node_public_key {
        inner.push(TransactionDescriptor::NodeKeyLink {
            common: common.clone(),
            linked_public_key: key.clone(),
            action: LinkAction::Unlink,
        });
    }
    inner
}

/// Active means the node is actually harvesting with the remote key; linked
/// keys without the node unlock only get to Pending.
pub async fn harvesting_status(
    client: &NodeClient,
    linked_keys: &LinkedKeys,
) -> Result<HarvestingStatus, WalletError> {
    let remote = match (
        &linked_keys.vrf_public_key,
        &linked_keys.linked_public_key,
        &linked_keys.node_public_key,
    ) {
        (Some(_), Some(remote), Some(_)) => remote,
        _ => return Ok(HarvestingStatus::Inactive),
    };

    let unlocked = client.unlocked_accounts().await?;
    if unlocked.iter().any(|key| key.eq_ignore_ascii_case(remote)) {
        Ok(HarvestingStatus::Active)
    } else {
        Ok(HarvestingStatus::Pending)
    }
}
