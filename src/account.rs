//! Account data model
//!
//! Accounts are owned by the wallet state store, one list per network.
//! `AccountInfo` is the on-chain view of an account and is cached per
//! address; it is only ever replaced by a fresh fetch, never patched.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Derived from the wallet seed at `index`.
    Seed,
    /// Imported from an external private key.
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    pub address: String,
    pub public_key: String,
    /// Opaque handle into the embedder's secure key storage. Never the key
    /// material itself.
    pub private_key_ref: String,
    pub account_type: AccountType,
    /// Derivation index for seed accounts.
    pub index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mosaic {
    pub id: String,
    pub amount: u64,
}

/// The three supplemental keys an account can link for delegated harvesting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedKeys {
    pub vrf_public_key: Option<String>,
    pub linked_public_key: Option<String>,
    pub node_public_key: Option<String>,
}

impl LinkedKeys {
    pub fn all_linked(&self) -> bool {
        self.vrf_public_key.is_some()
            && self.linked_public_key.is_some()
            && self.node_public_key.is_some()
    }

    pub fn any_linked(&self) -> bool {
        self.vrf_public_key.is_some()
            || self.linked_public_key.is_some()
            || self.node_public_key.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub address: String,
    pub public_key: String,
    /// Balance of the network currency mosaic, in absolute units.
    pub balance: u64,
    pub mosaics: Vec<Mosaic>,
    pub importance: u64,
    pub linked_keys: LinkedKeys,
    pub cosignatories: Vec<String>,
    pub multisig_addresses: Vec<String>,
}

impl AccountInfo {
    /// An account is multisig exactly when it has cosignatories. Derived so
    /// the flag can never drift from the list it summarizes.
    pub fn is_multisig(&self) -> bool {
        !self.cosignatories.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarvestingStatus {
    /// Supplemental keys are not (fully) linked.
    Inactive,
    /// Keys are linked but the node has not unlocked the account yet.
    Pending,
    /// Keys are linked and the node reports the account as unlocked.
    Active,
}
