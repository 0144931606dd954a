//! Error types for the template store

use thiserror::Error;

use crate::record::Category;
use crate::storage::StorageError;

/// Store-level errors
///
/// Every variant except [`StoreError::StorageIntegrity`] is raised before the
/// index is mutated, so the request can be retried as-is.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Template '{display_name}' already exists in category {category}")]
    Conflict {
        display_name: String,
        category: Category,
    },

    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Blob and index may disagree; needs a reconciliation pass.
    #[error("Storage integrity error: {0}")]
    StorageIntegrity(String),
}

impl StoreError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::StorageIntegrity(msg.into())
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
