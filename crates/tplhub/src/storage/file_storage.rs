use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::blob_storage::{BlobStorage, StorageError, validate_key};
use crate::record::Category;

/// File-based blob storage rooted at the git working tree
///
/// Directory structure:
/// ```text
/// root/
/// ├── live/
/// │   └── <displayName>_<suffix>.zip
/// ├── file/
/// │   └── <displayName>_<suffix>.zip
/// └── metadata.json
/// ```
#[derive(Debug, Clone)]
pub struct FileBlobStorage {
    root: PathBuf,
}

impl FileBlobStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl BlobStorage for FileBlobStorage {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path(key)?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::backend(key, e))?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| StorageError::backend(key, e))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::backend(key, e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path(key)?;
        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::backend(key, e)
            }
        })
    }

    fn path(&self, key: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(validate_key(key)?))
    }

    async fn ensure_layout(&self) -> Result<(), StorageError> {
        for category in Category::ALL {
            let dir = self.root.join(category.dir_name());
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| StorageError::backend(category.dir_name(), e))?;
        }
        Ok(())
    }
}
