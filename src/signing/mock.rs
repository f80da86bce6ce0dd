//! Deterministic mock signing backend
//!
//! Hashes stand in for real signature math: payloads are hex-encoded JSON
//! envelopes and every derived value is a SHA-256 of its inputs, so the
//! sign/re-derive identity holds without any curve arithmetic. Call counters
//! let tests assert that guarded paths never reach the signer.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::RngCore;
use sha2::{Digest, Sha256};

use super::{CosignatureDto, CosignatureSignedTransaction, KeyPair, SignedTransaction, SigningService};
use crate::error::WalletError;
use crate::network::{NetworkIdentifier, NetworkProperties};
use crate::transaction::TransactionDescriptor;

/// Marker prefix of an encoded delegated-harvesting message.
pub const DELEGATION_MARKER: &str = "FE2A8061577301E2";

#[derive(Default)]
pub struct MockSigner {
    sign_calls: AtomicUsize,
    cosign_calls: AtomicUsize,
}

impl MockSigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_count(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    pub fn cosign_count(&self) -> usize {
        self.cosign_calls.load(Ordering::SeqCst)
    }

    /// Public key for a private key, stable across calls.
    pub fn public_key_of(private_key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"pub");
        hasher.update(private_key.as_bytes());
        hex::encode(hasher.finalize()).to_uppercase()
    }

    fn digest_hex(parts: &[&[u8]]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        hex::encode(hasher.finalize()).to_uppercase()
    }
}

impl SigningService for MockSigner {
    fn sign(
        &self,
        properties: &NetworkProperties,
        descriptor: &TransactionDescriptor,
        private_key: &str,
    ) -> Result<SignedTransaction, WalletError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);

        let signer_public_key = Self::public_key_of(private_key);
        if !descriptor
            .common()
            .signer_public_key
            .eq_ignore_ascii_case(&signer_public_key)
        {
            return Err(WalletError::Signing(format!(
                "descriptor signer {} does not match the signing key",
                descriptor.common().signer_public_key
            )));
        }

        let body = serde_json::to_vec(descriptor)
            .map_err(|e| WalletError::Signing(format!("descriptor serialization failed: {}", e)))?;
        let signature = Self::digest_hex(&[private_key.as_bytes(), &body]);

        let envelope = serde_json::json!({
            "descriptor": descriptor,
            "signature": signature,
            "signerPublicKey": signer_public_key,
        });
        let envelope_bytes = serde_json::to_vec(&envelope)
            .map_err(|e| WalletError::Signing(format!("payload serialization failed: {}", e)))?;
        let payload = hex::encode(envelope_bytes).to_uppercase();
        let hash = self.transaction_hash(&payload, &properties.generation_hash);

        Ok(SignedTransaction {
            payload,
            hash,
            signer_public_key,
        })
    }

    fn cosign(
        &self,
        properties: &NetworkProperties,
        descriptor: &TransactionDescriptor,
        private_key: &str,
    ) -> Result<CosignatureSignedTransaction, WalletError> {
        self.cosign_calls.fetch_add(1, Ordering::SeqCst);

        let parent_hash = match descriptor {
            TransactionDescriptor::AggregateBonded {
                transaction_info: Some(info),
                ..
            } => info.hash.clone(),
            TransactionDescriptor::AggregateBonded { .. } => {
                return Err(WalletError::Signing(
                    "descriptor carries no parent hash to cosign".to_string(),
                ));
            }
            other => {
                return Err(WalletError::Signing(format!(
                    "cannot cosign a {} transaction",
                    other.type_name()
                )));
            }
        };

        let signature = Self::digest_hex(&[
            b"cosign",
            properties.generation_hash.as_bytes(),
            private_key.as_bytes(),
            parent_hash.as_bytes(),
        ]);

        Ok(CosignatureSignedTransaction {
            hash: parent_hash.clone(),
            dto: CosignatureDto {
                parent_hash,
                signature,
                signer_public_key: Self::public_key_of(private_key),
                version: 0,
            },
        })
    }

    fn generate_key_pair(&self) -> Result<KeyPair, WalletError> {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        let private_key = hex::encode(seed).to_uppercase();
        let public_key = Self::public_key_of(&private_key);
        Ok(KeyPair {
            private_key,
            public_key,
        })
    }

    fn derive_address(&self, public_key: &str, network: NetworkIdentifier) -> String {
        let digest = Self::digest_hex(&[
            public_key.to_uppercase().as_bytes(),
            &[network.value()],
        ]);
        // Prefix char plus 38 digest chars, matching the 39-char address form.
        format!("{}{}", network.address_prefix(), &digest[..38])
    }

    fn encode_delegation_message(
        &self,
        account_private_key: &str,
        node_public_key: &str,
        remote_private_key: &str,
        vrf_private_key: &str,
    ) -> Result<String, WalletError> {
        let body = Self::digest_hex(&[
            account_private_key.as_bytes(),
            node_public_key.as_bytes(),
            remote_private_key.as_bytes(),
            vrf_private_key.as_bytes(),
        ]);
        Ok(format!("{}{}", DELEGATION_MARKER, body))
    }

    fn transaction_hash(&self, payload: &str, generation_hash: &str) -> String {
        Self::digest_hex(&[generation_hash.as_bytes(), payload.as_bytes()])
    }
}
