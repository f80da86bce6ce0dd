//! Transaction descriptors and event payloads
//!
//! `TransactionDescriptor` is a closed union over every transaction kind the
//! orchestrator can build or inspect. Aggregate kinds own their inner
//! descriptors outright; an inner transaction has no identity of its own.

use serde::{Deserialize, Serialize};

use crate::account::Mosaic;

/// Wire codes for transaction kinds, as used by the REST transaction DTOs.
pub mod transaction_type {
    pub const TRANSFER: u16 = 0x4154;
    pub const AGGREGATE_COMPLETE: u16 = 0x4141;
    pub const AGGREGATE_BONDED: u16 = 0x4241;
    pub const HASH_LOCK: u16 = 0x4148;
    pub const VRF_KEY_LINK: u16 = 0x4243;
    pub const ACCOUNT_KEY_LINK: u16 = 0x414C;
    pub const NODE_KEY_LINK: u16 = 0x424C;
}

/// Fields shared by every transaction kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCommon {
    pub signer_public_key: String,
    pub max_fee: u64,
    /// Milliseconds since the network epoch.
    pub deadline: u64,
}

/// Chain-side metadata attached to transactions fetched from a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub hash: String,
    pub height: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkAction {
    Link,
    Unlink,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TransactionDescriptor {
    Transfer {
        #[serde(flatten)]
        common: TransactionCommon,
        recipient_address: String,
        mosaics: Vec<Mosaic>,
        message: Option<String>,
    },
    AggregateComplete {
        #[serde(flatten)]
        common: TransactionCommon,
        inner: Vec<TransactionDescriptor>,
    },
    AggregateBonded {
        #[serde(flatten)]
        common: TransactionCommon,
        inner: Vec<TransactionDescriptor>,
        /// Present on partial transactions fetched from a node; required for
        /// cosigning.
        transaction_info: Option<TransactionInfo>,
    },
    HashLock {
        #[serde(flatten)]
        common: TransactionCommon,
        mosaic: Mosaic,
        /// Lock lifetime in blocks.
        duration: u64,
        /// Hash of the aggregate the lock pays for.
        target_hash: String,
    },
    VrfKeyLink {
        #[serde(flatten)]
        common: TransactionCommon,
        linked_public_key: String,
        action: LinkAction,
    },
    AccountKeyLink {
        #[serde(flatten)]
        common: TransactionCommon,
        linked_public_key: String,
        action: LinkAction,
    },
    NodeKeyLink {
        #[serde(flatten)]
        common: TransactionCommon,
        linked_public_key: String,
        action: LinkAction,
    },
}

impl TransactionDescriptor {
    pub fn common(&self) -> &TransactionCommon {
        match self {
            TransactionDescriptor::Transfer { common, .. }
            | TransactionDescriptor::AggregateComplete { common, .. }
            | TransactionDescriptor::AggregateBonded { common, .. }
            | TransactionDescriptor::HashLock { common, .. }
            | TransactionDescriptor::VrfKeyLink { common, .. }
            | TransactionDescriptor::AccountKeyLink { common, .. }
            | TransactionDescriptor::NodeKeyLink { common, .. } => common,
        }
    }

    pub fn transaction_type(&self) -> u16 {
        match self {
            TransactionDescriptor::Transfer { .. } => transaction_type::TRANSFER,
            TransactionDescriptor::AggregateComplete { .. } => {
                transaction_type::AGGREGATE_COMPLETE
            }
            TransactionDescriptor::AggregateBonded { .. } => transaction_type::AGGREGATE_BONDED,
            TransactionDescriptor::HashLock { .. } => transaction_type::HASH_LOCK,
            TransactionDescriptor::VrfKeyLink { .. } => transaction_type::VRF_KEY_LINK,
            TransactionDescriptor::AccountKeyLink { .. } => transaction_type::ACCOUNT_KEY_LINK,
            TransactionDescriptor::NodeKeyLink { .. } => transaction_type::NODE_KEY_LINK,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            TransactionDescriptor::Transfer { .. } => "transfer",
            TransactionDescriptor::AggregateComplete { .. } => "aggregate complete",
            TransactionDescriptor::AggregateBonded { .. } => "aggregate bonded",
            TransactionDescriptor::HashLock { .. } => "hash lock",
            TransactionDescriptor::VrfKeyLink { .. } => "vrf key link",
            TransactionDescriptor::AccountKeyLink { .. } => "account key link",
            TransactionDescriptor::NodeKeyLink { .. } => "node key link",
        }
    }

    pub fn is_aggregate_bonded(&self) -> bool {
        matches!(self, TransactionDescriptor::AggregateBonded { .. })
    }
}

/// Normalized view of a transaction fetched from a node, used for listener
/// events and the recent-transaction cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub hash: String,
    #[serde(rename = "type")]
    pub transaction_type: u16,
    pub signer_public_key: String,
    pub recipient_address: Option<String>,
    /// Zero while the transaction is unconfirmed or partial.
    pub height: u64,
}

/// New-block event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    pub height: u64,
    #[serde(default)]
    pub timestamp: u64,
    pub hash: Option<String>,
}

/// Transaction-status event payload (the ERROR group).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatusError {
    pub hash: String,
    pub code: String,
    /// Nodes encode uint64 values as strings; accept both forms.
    #[serde(default, deserialize_with = "lenient_u64")]
    pub deadline: u64,
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
