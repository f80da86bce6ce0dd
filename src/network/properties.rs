//! Network properties snapshot
//!
//! One immutable snapshot per connected node, replaced wholesale on every
//! successful fetch. Nothing in the crate mutates an existing snapshot.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Divisibility of the network currency mosaic. The properties endpoint does
/// not carry it, so it is fixed to the protocol value.
pub const CURRENCY_DIVISIBILITY: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkIdentifier {
    MainNet,
    TestNet,
}

impl NetworkIdentifier {
    /// Protocol byte carried in node info and encoded into addresses.
    pub fn value(&self) -> u8 {
        match self {
            NetworkIdentifier::MainNet => 104,
            NetworkIdentifier::TestNet => 152,
        }
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            104 => Some(NetworkIdentifier::MainNet),
            152 => Some(NetworkIdentifier::TestNet),
            _ => None,
        }
    }

    /// Identifier string as reported by `/network/properties`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mainnet" => Some(NetworkIdentifier::MainNet),
            "testnet" => Some(NetworkIdentifier::TestNet),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NetworkIdentifier::MainNet => "mainnet",
            NetworkIdentifier::TestNet => "testnet",
        }
    }

    /// First character of addresses on this network.
    pub fn address_prefix(&self) -> char {
        match self {
            NetworkIdentifier::MainNet => 'N',
            NetworkIdentifier::TestNet => 'T',
        }
    }
}

impl fmt::Display for NetworkIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkCurrency {
    pub mosaic_id: String,
    pub divisibility: u8,
}

/// Current fee multipliers as reported by the node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFees {
    #[serde(default)]
    pub average_fee_multiplier: u64,
    #[serde(default)]
    pub median_fee_multiplier: u64,
    #[serde(default)]
    pub highest_fee_multiplier: u64,
    #[serde(default)]
    pub lowest_fee_multiplier: u64,
    #[serde(default)]
    pub min_fee_multiplier: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProperties {
    /// REST gateway the snapshot was fetched from.
    pub node_url: String,
    pub network_identifier: NetworkIdentifier,
    pub generation_hash: String,
    /// Seconds between the Unix epoch and the network epoch. Transaction
    /// deadlines are milliseconds since the network epoch.
    pub epoch_adjustment: u64,
    pub network_currency: NetworkCurrency,
    pub transaction_fees: TransactionFees,
    pub chain_height: u64,
}

impl NetworkProperties {
    /// Deadline `lifetime` from now, in network-epoch milliseconds.
    pub fn deadline_from_now(&self, lifetime: Duration) -> u64 {
        let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let epoch_ms = self.epoch_adjustment.saturating_mul(1000);
        now_ms.saturating_sub(epoch_ms) + lifetime.as_millis() as u64
    }
}
