//! Signing service boundary
//!
//! Transaction serialization and signature math live behind this trait; the
//! orchestration layer never touches key material beyond passing it through.
//! A deterministic [`MockSigner`] ships for tests and local development.

mod mock;

pub use mock::MockSigner;

use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::network::{NetworkIdentifier, NetworkProperties};
use crate::transaction::TransactionDescriptor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    pub private_key: String,
    pub public_key: String,
}

/// A signed transaction payload. Immutable once produced; the hash uniquely
/// identifies the payload and is what listener events are correlated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub payload: String,
    pub hash: String,
    pub signer_public_key: String,
}

/// A cosignature for a partial aggregate. `hash` is the parent aggregate's
/// hash, which is what confirmation events are correlated against; `dto` is
/// the body announced on the cosignature endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosignatureSignedTransaction {
    pub hash: String,
    pub dto: CosignatureDto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosignatureDto {
    pub parent_hash: String,
    pub signature: String,
    pub signer_public_key: String,
    pub version: u64,
}

/// Contract with the signing backend.
///
/// Implementations must be deterministic for identical inputs and must not
/// mutate the descriptor (enforced by the borrowed receivers).
pub trait SigningService: Send + Sync {
    fn sign(
        &self,
        properties: &NetworkProperties,
        descriptor: &TransactionDescriptor,
        private_key: &str,
    ) -> Result<SignedTransaction, WalletError>;

    /// Cosign a fetched partial aggregate. The parent hash comes from the
    /// descriptor's transaction info.
    fn cosign(
        &self,
        properties: &NetworkProperties,
        descriptor: &TransactionDescriptor,
        private_key: &str,
    ) -> Result<CosignatureSignedTransaction, WalletError>;

    fn generate_key_pair(&self) -> Result<KeyPair, WalletError>;

    fn derive_address(&self, public_key: &str, network: NetworkIdentifier) -> String;

    /// Encode the delegated-harvesting request message carried by the
    /// transfer to the harvesting node.
    fn encode_delegation_message(
        &self,
        account_private_key: &str,
        node_public_key: &str,
        remote_private_key: &str,
        vrf_private_key: &str,
    ) -> Result<String, WalletError>;

    /// Re-derive the hash of a signed payload. Must equal the hash returned
    /// at signing time for the same generation hash.
    fn transaction_hash(&self, payload: &str, generation_hash: &str) -> String;
}
