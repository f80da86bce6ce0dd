//! Node REST client
//!
//! Thin typed wrapper over a node's REST gateway. One method per endpoint,
//! camelCase DTOs mirroring the wire format, and a small amount of
//! composition where the wallet-facing shape spans several endpoints.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::account::{AccountInfo, LinkedKeys, Mosaic};
use crate::error::WalletError;
use crate::network::properties::{
    NetworkCurrency, NetworkIdentifier, NetworkProperties, TransactionFees, CURRENCY_DIVISIBILITY,
};
use crate::signing::{CosignatureDto, SignedTransaction};
use crate::transaction::TransactionSummary;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const BLOCK_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct NodeClient {
    base_url: String,
    client: reqwest::Client,
}

impl NodeClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn node_info(&self) -> Result<NodeInfoDto, WalletError> {
        self.get_json("/node/info").await
    }

    /// Full network-properties snapshot for this node, rejected when the
    /// node reports a different network than the wallet expects.
    pub async fn network_properties(
        &self,
        expected: NetworkIdentifier,
    ) -> Result<NetworkProperties, WalletError> {
        let raw: NetworkPropertiesDto = self.get_json("/network/properties").await?;

        let identifier = NetworkIdentifier::from_name(&raw.network.identifier).ok_or_else(|| {
            WalletError::Network(format!(
                "node {} reports unknown network '{}'",
                self.base_url, raw.network.identifier
            ))
        })?;
        if identifier != expected {
            return Err(WalletError::NetworkMismatch(format!(
                "node {} is on {}, wallet is on {}",
                self.base_url, identifier, expected
            )));
        }

        let epoch_adjustment = parse_uint64(
            raw.network.epoch_adjustment.trim_end_matches('s'),
            "epochAdjustment",
        )?;
        let chain: ChainInfoDto = self.get_json("/chain/info").await?;
        let fees: TransactionFees = self.get_json("/network/fees/transaction").await?;

        Ok(NetworkProperties {
            node_url: self.base_url.clone(),
            network_identifier: identifier,
            generation_hash: raw.network.generation_hash_seed,
            epoch_adjustment,
            network_currency: NetworkCurrency {
                mosaic_id: normalize_mosaic_id(&raw.chain.currency_mosaic_id),
                divisibility: CURRENCY_DIVISIBILITY,
            },
            transaction_fees: fees,
            chain_height: parse_uint64(&chain.height, "height")?,
        })
    }

    /// Account info composed with the multisig graph. `Ok(None)` for
    /// addresses the chain has not seen yet.
    pub async fn fetch_account_info(
        &self,
        address: &str,
        currency_mosaic_id: &str,
    ) -> Result<Option<AccountInfo>, WalletError> {
        let account: AccountDto = match self
            .get_json_optional(&format!("/accounts/{}", address))
            .await?
        {
            Some(dto) => dto,
            None => return Ok(None),
        };

        // Accounts without a multisig graph 404 here.
        let multisig: Option<MultisigDto> = self
            .get_json_optional(&format!("/account/{}/multisig", address))
            .await?;
        let multisig = multisig.map(|m| m.multisig).unwrap_or_default();

        let mut mosaics = Vec::with_capacity(account.account.mosaics.len());
        for entry in &account.account.mosaics {
            mosaics.push(Mosaic {
                id: entry.id.clone(),
                amount: parse_uint64(&entry.amount, "mosaic amount")?,
            });
        }
        let balance = mosaics
            .iter()
            .find(|m| m.id.eq_ignore_ascii_case(currency_mosaic_id))
            .map(|m| m.amount)
            .unwrap_or(0);
        let importance = if account.account.importance.is_empty() {
            0
        } else {
            parse_uint64(&account.account.importance, "importance")?
        };

        let keys = account.account.supplemental_public_keys;
        Ok(Some(AccountInfo {
            address: address.to_string(),
            public_key: account.account.public_key,
            balance,
            mosaics,
            importance,
            linked_keys: LinkedKeys {
                vrf_public_key: keys.vrf.map(|k| k.public_key),
                linked_public_key: keys.linked.map(|k| k.public_key),
                node_public_key: keys.node.map(|k| k.public_key),
            },
            cosignatories: multisig.cosignatory_addresses,
            multisig_addresses: multisig.multisig_addresses,
        }))
    }

    /// All confirmed transactions of one block.
    pub async fn block_transactions(
        &self,
        height: u64,
    ) -> Result<Vec<TransactionSummary>, WalletError> {
        let page: TransactionPageDto = self
            .get_json(&format!(
                "/transactions/confirmed?height={}&pageSize={}",
                height, BLOCK_PAGE_SIZE
            ))
            .await?;
        page.data.into_iter().map(|dto| dto.into_summary()).collect()
    }

    /// Most recent confirmed transactions involving `address`, newest first.
    pub async fn confirmed_transactions_for(
        &self,
        address: &str,
        page_size: u32,
    ) -> Result<Vec<TransactionSummary>, WalletError> {
        let page: TransactionPageDto = self
            .get_json(&format!(
                "/transactions/confirmed?address={}&pageSize={}&order=desc",
                address, page_size
            ))
            .await?;
        page.data.into_iter().map(|dto| dto.into_summary()).collect()
    }

    pub async fn unconfirmed_transaction(
        &self,
        hash: &str,
    ) -> Result<Option<TransactionSummary>, WalletError> {
        let dto: Option<TransactionDto> = self
            .get_json_optional(&format!("/transactions/unconfirmed/{}", hash))
            .await?;
        dto.map(|d| d.into_summary()).transpose()
    }

    pub async fn partial_transaction(
        &self,
        hash: &str,
    ) -> Result<Option<TransactionSummary>, WalletError> {
        let dto: Option<TransactionDto> = self
            .get_json_optional(&format!("/transactions/partial/{}", hash))
            .await?;
        dto.map(|d| d.into_summary()).transpose()
    }

    /// Public keys the node currently harvests for.
    pub async fn unlocked_accounts(&self) -> Result<Vec<String>, WalletError> {
        let dto: UnlockedAccountDto = self.get_json("/node/unlockedaccount").await?;
        Ok(dto.unlocked_account)
    }

    pub async fn announce(&self, signed: &SignedTransaction) -> Result<String, WalletError> {
        self.put_announce("/transactions", &serde_json::json!({ "payload": signed.payload }))
            .await
    }

    pub async fn announce_partial(
        &self,
        signed: &SignedTransaction,
    ) -> Result<String, WalletError> {
        self.put_announce(
            "/transactions/partial",
            &serde_json::json!({ "payload": signed.payload }),
        )
        .await
    }

    pub async fn announce_cosignature(
        &self,
        cosignature: &CosignatureDto,
    ) -> Result<String, WalletError> {
        let body = serde_json::to_value(cosignature)
            .map_err(|e| WalletError::Internal(format!("cosignature serialization failed: {}", e)))?;
        self.put_announce("/transactions/cosignature", &body).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, WalletError> {
        match self.get_json_optional(path).await? {
            Some(value) => Ok(value),
            None => Err(WalletError::Network(format!(
                "GET {}{} returned 404",
                self.base_url, path
            ))),
        }
    }

    async fn get_json_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, WalletError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| WalletError::Network(format!("GET {} failed: {}", url, e)))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(WalletError::Network(format!(
                "GET {} returned {}: {}",
                url, status, body
            )));
        }

        let value = resp
            .json::<T>()
            .await
            .map_err(|e| WalletError::Network(format!("GET {} returned invalid JSON: {}", url, e)))?;
        Ok(Some(value))
    }

    async fn put_announce(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<String, WalletError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .put(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|e| WalletError::Network(format!("PUT {} failed: {}", url, e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| WalletError::Network(format!("PUT {} response unreadable: {}", url, e)))?;

        if !status.is_success() {
            // Rejections come back as {"code": ..., "message": ...}.
            let message = serde_json::from_str::<ErrorBodyDto>(&text)
                .map(|e| e.message)
                .unwrap_or(text);
            return Err(WalletError::Rejected(format!("{} ({})", message, status)));
        }

        let accepted = serde_json::from_str::<AnnounceResponseDto>(&text)
            .map(|a| a.message)
            .unwrap_or_default();
        log::debug!("PUT {} accepted: {}", url, accepted);
        Ok(accepted)
    }
}

// ---------------------------------------------------------------------------
// Wire DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfoDto {
    #[serde(default)]
    pub version: u32,
    pub public_key: String,
    pub network_identifier: u8,
    #[serde(default)]
    pub network_generation_hash_seed: String,
    #[serde(default)]
    pub roles: u32,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub friendly_name: String,
}

#[derive(Debug, Deserialize)]
struct NetworkPropertiesDto {
    network: NetworkSectionDto,
    chain: ChainSectionDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkSectionDto {
    identifier: String,
    epoch_adjustment: String,
    #[serde(default)]
    generation_hash_seed: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainSectionDto {
    #[serde(default)]
    currency_mosaic_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainInfoDto {
    height: String,
    #[serde(default)]
    score_high: String,
    #[serde(default)]
    score_low: String,
}

#[derive(Debug, Deserialize)]
struct AccountDto {
    account: AccountBodyDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountBodyDto {
    #[serde(default)]
    public_key: String,
    #[serde(default)]
    importance: String,
    #[serde(default)]
    mosaics: Vec<MosaicDto>,
    #[serde(default)]
    supplemental_public_keys: SupplementalKeysDto,
}

#[derive(Debug, Deserialize)]
struct MosaicDto {
    id: String,
    amount: String,
}

#[derive(Debug, Default, Deserialize)]
struct SupplementalKeysDto {
    linked: Option<KeyDto>,
    node: Option<KeyDto>,
    vrf: Option<KeyDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyDto {
    public_key: String,
}

#[derive(Debug, Deserialize)]
struct MultisigDto {
    multisig: MultisigBodyDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultisigBodyDto {
    #[serde(default)]
    cosignatory_addresses: Vec<String>,
    #[serde(default)]
    multisig_addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionPageDto {
    #[serde(default)]
    data: Vec<TransactionDto>,
}

#[derive(Debug, Deserialize)]
struct TransactionDto {
    #[serde(default)]
    meta: TransactionMetaDto,
    transaction: TransactionBodyDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionMetaDto {
    #[serde(default)]
    hash: String,
    #[serde(default)]
    height: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBodyDto {
    #[serde(rename = "type")]
    transaction_type: u16,
    #[serde(default)]
    signer_public_key: String,
    #[serde(default)]
    recipient_address: Option<String>,
}

impl TransactionDto {
    fn into_summary(self) -> Result<TransactionSummary, WalletError> {
        let height = if self.meta.height.is_empty() {
            0
        } else {
            parse_uint64(&self.meta.height, "height")?
        };
        Ok(TransactionSummary {
            hash: self.meta.hash,
            transaction_type: self.transaction.transaction_type,
            signer_public_key: self.transaction.signer_public_key,
            recipient_address: self.transaction.recipient_address,
            height,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnlockedAccountDto {
    #[serde(default)]
    unlocked_account: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AnnounceResponseDto {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBodyDto {
    #[serde(default)]
    message: String,
}

/// Parse the string-encoded 64-bit integers the REST gateway uses.
fn parse_uint64(value: &str, field: &str) -> Result<u64, WalletError> {
    value
        .parse::<u64>()
        .map_err(|_| WalletError::Network(format!("invalid {} value '{}'", field, value)))
}

/// Mosaic ids in `/network/properties` come quoted, e.g. `0x72C0'212E'67A0'8BCE`.
fn normalize_mosaic_id(raw: &str) -> String {
    raw.trim_start_matches("0x")
        .chars()
        .filter(|c| *c != '\'')
        .collect::<String>()
        .to_uppercase()
}
