//! Wallet state and persistence
//!
//! - State store with per-network caches and identity-guarded commits
//! - Storage trait with file-backed and in-memory implementations

mod persistent;
mod state;

pub use persistent::{
    AccountsSnapshot, FileStorage, MemoryStorage, PersistentStorage, SelectedNode,
};
pub use state::{StoreIdentity, WalletStateStore};
