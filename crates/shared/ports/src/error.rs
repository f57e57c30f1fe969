use thiserror::Error;

/// Storage gateway errors
///
/// Every variant means the store can no longer be trusted for the current
/// operation; callers treat the gateway as down until it reconnects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store is not connected")]
    Disconnected,

    #[error("Failed to connect to store: {0}")]
    Connect(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Stored row is invalid: {0}")]
    InvalidRow(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
