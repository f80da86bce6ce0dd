use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Node rejected request: {0}")]
    Rejected(String),

    #[error("Network mismatch: {0}")]
    NetworkMismatch(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid transaction type: {0}")]
    InvalidTransactionType(String),

    #[error("Listener failed to open: {0}")]
    ListenerOpen(String),

    #[error("Listener closed: {0}")]
    ListenerClosed(String),

    #[error("Confirmation timeout: {0}")]
    ConfirmationTimeout(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),
}
