//! Transaction layer
//!
//! - Descriptor model for every transaction the wallet can announce
//! - Orchestrator for plain, two-phase bonded, and cosignature flows
//! - Delegated-harvesting aggregate builders

mod harvesting;
mod orchestrator;
mod types;

pub use harvesting::{
    create_start_harvesting_transaction, create_stop_harvesting_transaction, harvesting_status,
    StartHarvestingBundle,
};
pub use orchestrator::{AnnounceOptions, HashLockParams, TransactionOrchestrator};
pub use types::{
    transaction_type, BlockInfo, LinkAction, TransactionCommon, TransactionDescriptor,
    TransactionInfo, TransactionStatusError, TransactionSummary,
};
