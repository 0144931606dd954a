//! Blob storage abstraction for the store
//!
//! Keys are paths relative to the working tree, e.g. `live/Banner_1a2b3c4d.zip`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Invalid key format: {0}")]
    InvalidKey(String),
}

impl StorageError {
    pub fn backend(key: &str, err: impl std::fmt::Display) -> Self {
        Self::Backend(format!("{}: {}", key, err))
    }
}

/// Abstraction for blob storage backends
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store data at the given key, replacing any existing blob
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Delete data by key
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Local path of the blob for streaming it back to a client
    fn path(&self, key: &str) -> Result<PathBuf, StorageError>;

    /// Create the per-category directories. Idempotent.
    async fn ensure_layout(&self) -> Result<(), StorageError>;
}

/// Reject keys that would escape the storage root
pub fn validate_key(key: &str) -> Result<&Path, StorageError> {
    let path = Path::new(key);
    let mut normal = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => normal = true,
            _ => return Err(StorageError::InvalidKey(key.to_string())),
        }
    }
    if !normal {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("live/a.zip").is_ok());
        assert!(validate_key("metadata.json").is_ok());

        for bad in ["", "/etc/passwd", "../a.zip", "live/../../a.zip", "./a.zip"] {
            match validate_key(bad) {
                Err(StorageError::InvalidKey(key)) => assert_eq!(key, bad),
                other => panic!("Expected InvalidKey for {:?}, got {:?}", bad, other),
            }
        }
    }
}
