//! Error kinds reported by message stores

use std::fmt::Display;
use std::sync::PoisonError;

/// Result alias used throughout the storage layer
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by [`NamespacedStore`](crate::storage::NamespacedStore) operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying engine could not be opened or a transaction failed
    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// A message ID was not a decimal unsigned 64-bit integer
    #[error("Invalid message ID: {id:?}")]
    InvalidId { id: String },

    #[error("Message {id} not found in namespace {namespace}")]
    NotFound { namespace: String, id: String },

    /// A record could not be encoded or decoded
    #[error("Message serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Namespace does not exist: {namespace}")]
    NamespaceMissing { namespace: String },

    #[error("Invalid namespace name: {namespace:?}")]
    InvalidNamespace { namespace: String },
}

impl StoreError {
    pub fn unavailable(message: impl Display) -> Self {
        StoreError::StoreUnavailable {
            message: message.to_string(),
        }
    }

    pub fn namespace_missing(namespace: &str) -> Self {
        StoreError::NamespaceMissing {
            namespace: namespace.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::unavailable(format!("database error: {}", e))
    }
}

impl From<rusqlite_migration::Error> for StoreError {
    fn from(e: rusqlite_migration::Error) -> Self {
        StoreError::unavailable(format!("migration failed: {}", e))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::unavailable(format!("I/O error: {}", e))
    }
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(_: PoisonError<T>) -> Self {
        StoreError::unavailable("store lock poisoned")
    }
}
