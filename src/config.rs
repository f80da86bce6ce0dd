//! Controller configuration
//!
//! Environment-driven with sensible defaults, so a bare `ControllerConfig::from_env()`
//! talks to the public testnet out of the box.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::network::NetworkIdentifier;
use crate::transaction::HashLockParams;

const DEFAULT_CONNECTION_INTERVAL_SECS: u64 = 15;
const DEFAULT_TRANSACTION_LIFETIME_SECS: u64 = 7200;
const DEFAULT_LOCK_DEPOSIT: u64 = 10_000_000;
const DEFAULT_LOCK_DURATION_BLOCKS: u64 = 480;
const DEFAULT_MAX_LATEST_TRANSACTIONS: usize = 20;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Network selected at startup.
    pub network: NetworkIdentifier,
    pub main_nodes: Vec<String>,
    pub test_nodes: Vec<String>,
    pub main_directory_url: Option<String>,
    pub test_directory_url: Option<String>,
    /// How often the supervisor re-runs its connection job.
    pub connection_interval: Duration,
    /// Lifetime used when stamping transaction deadlines.
    pub transaction_lifetime: Duration,
    pub lock_deposit: u64,
    pub lock_duration_blocks: u64,
    pub max_latest_transactions: usize,
    pub storage_dir: PathBuf,
}

impl ControllerConfig {
    pub fn from_env() -> Self {
        let network = env::var("WALLET_NETWORK")
            .ok()
            .and_then(|raw| NetworkIdentifier::from_name(&raw))
            .unwrap_or(NetworkIdentifier::TestNet);

        let main_nodes = env::var("WALLET_MAIN_NODES")
            .map(|raw| split_nodes(&raw))
            .unwrap_or_else(|_| default_main_nodes());
        let test_nodes = env::var("WALLET_TEST_NODES")
            .map(|raw| split_nodes(&raw))
            .unwrap_or_else(|_| default_test_nodes());

        let main_directory_url = env::var("WALLET_MAIN_NODE_DIRECTORY")
            .ok()
            .filter(|url| !url.is_empty())
            .or_else(|| Some("https://symbol.services/nodes?limit=30".to_string()));
        let test_directory_url = env::var("WALLET_TEST_NODE_DIRECTORY")
            .ok()
            .filter(|url| !url.is_empty())
            .or_else(|| Some("https://testnet.symbol.services/nodes?limit=30".to_string()));

        let connection_interval = Duration::from_secs(
            env::var("WALLET_CONNECTION_INTERVAL_SECS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_CONNECTION_INTERVAL_SECS),
        );
        let transaction_lifetime = Duration::from_secs(
            env::var("WALLET_TRANSACTION_LIFETIME_SECS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_TRANSACTION_LIFETIME_SECS),
        );
        let lock_deposit = env::var("WALLET_LOCK_DEPOSIT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_LOCK_DEPOSIT);
        let lock_duration_blocks = env::var("WALLET_LOCK_DURATION_BLOCKS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_LOCK_DURATION_BLOCKS);
        let max_latest_transactions = env::var("WALLET_MAX_LATEST_TRANSACTIONS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_MAX_LATEST_TRANSACTIONS);
        let storage_dir = PathBuf::from(
            env::var("WALLET_STORAGE_DIR").unwrap_or_else(|_| "./wallet-data".to_string()),
        );

        log::info!("🔧 Wallet configuration:");
        log::info!("   Network: {}", network);
        log::info!(
            "   Nodes: {} mainnet / {} testnet",
            main_nodes.len(),
            test_nodes.len()
        );
        log::info!("   Connection interval: {:?}", connection_interval);
        log::info!("   Storage dir: {}", storage_dir.display());

        Self {
            network,
            main_nodes,
            test_nodes,
            main_directory_url,
            test_directory_url,
            connection_interval,
            transaction_lifetime,
            lock_deposit,
            lock_duration_blocks,
            max_latest_transactions,
            storage_dir,
        }
    }

    /// Seed nodes for one network.
    pub fn nodes(&self, network: NetworkIdentifier) -> Vec<String> {
        match network {
            NetworkIdentifier::MainNet => self.main_nodes.clone(),
            NetworkIdentifier::TestNet => self.test_nodes.clone(),
        }
    }

    pub fn directory_url(&self, network: NetworkIdentifier) -> Option<String> {
        match network {
            NetworkIdentifier::MainNet => self.main_directory_url.clone(),
            NetworkIdentifier::TestNet => self.test_directory_url.clone(),
        }
    }

    pub fn lock_params(&self) -> HashLockParams {
        HashLockParams {
            deposit: self.lock_deposit,
            duration: self.lock_duration_blocks,
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            network: NetworkIdentifier::TestNet,
            main_nodes: default_main_nodes(),
            test_nodes: default_test_nodes(),
            main_directory_url: Some("https://symbol.services/nodes?limit=30".to_string()),
            test_directory_url: Some("https://testnet.symbol.services/nodes?limit=30".to_string()),
            connection_interval: Duration::from_secs(DEFAULT_CONNECTION_INTERVAL_SECS),
            transaction_lifetime: Duration::from_secs(DEFAULT_TRANSACTION_LIFETIME_SECS),
            lock_deposit: DEFAULT_LOCK_DEPOSIT,
            lock_duration_blocks: DEFAULT_LOCK_DURATION_BLOCKS,
            max_latest_transactions: DEFAULT_MAX_LATEST_TRANSACTIONS,
            storage_dir: PathBuf::from("./wallet-data"),
        }
    }
}

fn split_nodes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|node| !node.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_main_nodes() -> Vec<String> {
    vec![
        "http://ngl-dual-001.symbolblockchain.io:3000".to_string(),
        "http://ngl-dual-101.symbolblockchain.io:3000".to_string(),
        "http://ngl-dual-201.symbolblockchain.io:3000".to_string(),
    ]
}

fn default_test_nodes() -> Vec<String> {
    vec![
        "http://sym-test-01.opening-line.jp:3000".to_string(),
        "http://sym-test-03.opening-line.jp:3000".to_string(),
        "http://201-sai-dual.symboltest.net:3000".to_string(),
    ]
}
