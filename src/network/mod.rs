//! Network layer
//!
//! Everything that talks to a node's REST gateway:
//! - Typed REST client with per-endpoint methods
//! - Candidate node directory with optional remote refresh
//! - Connection supervisor publishing status and network properties

mod client;
mod directory;
mod properties;
mod supervisor;

pub use client::{NodeClient, NodeInfoDto};
pub use directory::NodeDirectory;
pub use properties::{
    NetworkCurrency, NetworkIdentifier, NetworkProperties, TransactionFees, CURRENCY_DIVISIBILITY,
};
pub use supervisor::{ConnectionStatus, ConnectionSupervisor, SupervisorHandle};
