//! Wallet-core: node supervision, confirmation tracking and transaction
//! orchestration for Symbol-compatible networks.
//!
//! # Architecture
//!
//! - **Connection Supervisor**: Keeps one healthy node connection per
//!   network, with pinning and automatic failover
//! - **Confirmation Listener**: Per-account duplex WebSocket subscription
//!   with a typed channel per event group
//! - **Transaction Orchestrator**: Plain announcements, the two-phase
//!   aggregate-bonded commit, cosigning and harvesting aggregates
//! - **Wallet State Store**: Per-network caches mirrored to disk, guarded
//!   against stale async results
//!
//! # Example
//!
//! ```ignore
//! use wallet_core::{ControllerConfig, WalletController};
//! use wallet_core::signing::MockSigner;
//! use wallet_core::store::FileStorage;
//! use std::sync::Arc;
//!
//! let config = ControllerConfig::from_env();
//! let storage = Arc::new(FileStorage::new(&config.storage_dir));
//! let controller = WalletController::new(config, Arc::new(MockSigner::new()), storage);
//!
//! controller.load_cache().await?;
//! controller.start().await?;
//!
//! // ... announce transactions, watch confirmations ...
//!
//! controller.shutdown().await;
//! ```

// Public modules
pub mod account;
pub mod config;
pub mod controller;
pub mod error;
pub mod listener;
pub mod network;
pub mod signing;
pub mod store;
pub mod transaction;

// Re-exports for convenience
pub use account::{Account, AccountInfo, AccountType, HarvestingStatus, LinkedKeys, Mosaic};
pub use config::ControllerConfig;
pub use controller::WalletController;
pub use error::{StorageError, WalletError};
pub use listener::{AccountScope, CloseReason, ConfirmationListener};
pub use network::{ConnectionStatus, NetworkIdentifier, NetworkProperties};
pub use transaction::{
    AnnounceOptions, TransactionCommon, TransactionDescriptor, TransactionSummary,
};

// Common result type
pub type Result<T> = std::result::Result<T, WalletError>;
