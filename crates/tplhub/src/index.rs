//! Metadata index persisted as a single JSON document
//!
//! The whole table sits behind one reader/writer lock. Every mutation rewrites
//! the complete file before returning, and the in-memory table is never rolled
//! back when that rewrite fails.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::record::{AssetRecord, Category};

type Table = BTreeMap<String, AssetRecord>;

/// On-disk layout: `{"templates": {"<fileName>": {...}}}`
#[derive(Deserialize)]
struct IndexFile {
    #[serde(default)]
    templates: Table,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    templates: &'a Table,
}

/// Concurrency-safe mapping from generated file name to [`AssetRecord`]
#[derive(Debug)]
pub struct MetadataIndex {
    path: PathBuf,
    records: RwLock<Table>,
}

impl MetadataIndex {
    /// Create an empty index backed by `path`. Nothing is read until [`load`](Self::load).
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            records: RwLock::new(Table::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory table with the persisted one
    ///
    /// A missing file yields an empty index. Any other failure leaves the
    /// table empty and returns [`StoreError::StorageIntegrity`].
    pub async fn load(&self) -> Result<()> {
        let mut records = self.records.write().await;
        records.clear();

        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No index at {}, starting empty", self.path.display());
                return Ok(());
            }
            Err(e) => {
                return Err(StoreError::integrity(format!(
                    "Failed to read index {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let file: IndexFile = serde_json::from_slice(&content).map_err(|e| {
            StoreError::integrity(format!(
                "Failed to parse index {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(
            "Loaded {} records from {}",
            file.templates.len(),
            self.path.display()
        );
        *records = file.templates;
        Ok(())
    }

    /// Snapshot of the records, optionally restricted to one category
    ///
    /// Sorted by creation time descending, then display name ascending. The
    /// shared lock is held only while copying.
    pub async fn list(&self, category: Option<Category>) -> Vec<AssetRecord> {
        let mut snapshot: Vec<AssetRecord> = {
            let records = self.records.read().await;
            records
                .values()
                .filter(|r| category.is_none_or(|c| r.category == c))
                .cloned()
                .collect()
        };
        snapshot.sort_by(AssetRecord::listing_order);
        snapshot
    }

    pub async fn get(&self, file_name: &str) -> Option<AssetRecord> {
        self.records.read().await.get(file_name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Insert or replace a record and persist the table
    pub async fn upsert(&self, record: AssetRecord) -> Result<()> {
        self.write().await.upsert(record).await
    }

    /// Remove a record and persist the table
    pub async fn remove(&self, file_name: &str) -> Result<Option<AssetRecord>> {
        self.write().await.remove(file_name).await
    }

    /// Enter the exclusive section
    ///
    /// Readers and other writers wait until the returned guard is dropped, so
    /// side effects performed while holding it are serialized with every
    /// other mutation.
    pub async fn write(&self) -> IndexWriteGuard<'_> {
        IndexWriteGuard {
            path: &self.path,
            records: self.records.write().await,
        }
    }
}

/// Exclusive access to the index table
pub struct IndexWriteGuard<'a> {
    path: &'a Path,
    records: RwLockWriteGuard<'a, Table>,
}

impl IndexWriteGuard<'_> {
    /// Find a record by its (display name, category) pair
    pub fn find(&self, display_name: &str, category: Category) -> Option<&AssetRecord> {
        self.records
            .values()
            .find(|r| r.display_name == display_name && r.category == category)
    }

    pub fn get(&self, file_name: &str) -> Option<&AssetRecord> {
        self.records.get(file_name)
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.records.contains_key(file_name)
    }

    pub async fn upsert(&mut self, record: AssetRecord) -> Result<()> {
        self.records.insert(record.file_name.clone(), record);
        self.persist().await
    }

    pub async fn remove(&mut self, file_name: &str) -> Result<Option<AssetRecord>> {
        let removed = self.records.remove(file_name);
        self.persist().await?;
        Ok(removed)
    }

    /// Rewrite the whole index file from the current table
    async fn persist(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&IndexFileRef {
            templates: &*self.records,
        })
        .map_err(|e| StoreError::integrity(format!("Failed to serialize index: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::integrity(format!(
                    "Failed to create index directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        fs::write(self.path, json).await.map_err(|e| {
            StoreError::integrity(format!(
                "Failed to write index {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn record(name: &str, category: Category, created_at: i64) -> AssetRecord {
        AssetRecord::new(name, format!("{}_0000abcd.zip", name), category)
            .with_created_at(created_at)
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let temp_dir = tempdir().unwrap();
        let index = MetadataIndex::new(temp_dir.path().join("metadata.json"));

        index.load().await.unwrap();
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_persist_and_load_round_trip() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("metadata.json");

        let index = MetadataIndex::new(&path);
        index
            .upsert(record("Invoice", Category::File, 100))
            .await
            .unwrap();
        index
            .upsert(record("Banner", Category::Live, 200))
            .await
            .unwrap();

        let reloaded = MetadataIndex::new(&path);
        reloaded.load().await.unwrap();

        assert_eq!(reloaded.list(None).await, index.list(None).await);
        assert_eq!(reloaded.len().await, 2);
        assert_eq!(
            reloaded.get("Invoice_0000abcd.zip").await,
            Some(record("Invoice", Category::File, 100))
        );
    }

    #[tokio::test]
    async fn test_file_layout() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("metadata.json");

        let index = MetadataIndex::new(&path);
        index
            .upsert(record("Invoice", Category::File, 100))
            .await
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let entry = &value["templates"]["Invoice_0000abcd.zip"];
        assert_eq!(entry["displayName"], "Invoice");
        assert_eq!(entry["type"], "file");
        assert_eq!(entry["createTime"], 100);
    }

    #[tokio::test]
    async fn test_load_corrupt_file_fails_and_leaves_empty() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("metadata.json");

        let index = MetadataIndex::new(&path);
        index
            .upsert(record("Invoice", Category::File, 100))
            .await
            .unwrap();

        std::fs::write(&path, b"{ not json").unwrap();

        match index.load().await {
            Err(StoreError::StorageIntegrity(msg)) => assert!(msg.contains("parse")),
            other => panic!("Expected StorageIntegrity, got {:?}", other),
        }
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let temp_dir = tempdir().unwrap();
        let index = MetadataIndex::new(temp_dir.path().join("metadata.json"));

        index
            .upsert(record("b", Category::File, 10))
            .await
            .unwrap();
        index
            .upsert(record("c", Category::File, 30))
            .await
            .unwrap();
        index
            .upsert(record("a", Category::File, 30))
            .await
            .unwrap();
        index
            .upsert(record("z", Category::Live, 50))
            .await
            .unwrap();

        let names: Vec<_> = index
            .list(Some(Category::File))
            .await
            .into_iter()
            .map(|r| r.display_name)
            .collect();
        assert_eq!(names, vec!["a", "c", "b"]);

        let all = index.list(None).await;
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].display_name, "z");
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_in_memory_change() {
        let temp_dir = tempdir().unwrap();
        // The index path is a directory, so the rewrite must fail.
        let path = temp_dir.path().join("metadata.json");
        std::fs::create_dir_all(&path).unwrap();

        let index = MetadataIndex::new(&path);
        let result = index.upsert(record("Invoice", Category::File, 1)).await;

        assert!(matches!(result, Err(StoreError::StorageIntegrity(_))));
        assert!(index.get("Invoice_0000abcd.zip").await.is_some());
    }

    #[tokio::test]
    async fn test_remove_persists() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("metadata.json");

        let index = MetadataIndex::new(&path);
        index
            .upsert(record("Invoice", Category::File, 1))
            .await
            .unwrap();

        let removed = index.remove("Invoice_0000abcd.zip").await.unwrap();
        assert_eq!(removed.map(|r| r.display_name), Some("Invoice".to_string()));
        assert!(index.remove("Invoice_0000abcd.zip").await.unwrap().is_none());

        let reloaded = MetadataIndex::new(&path);
        reloaded.load().await.unwrap();
        assert!(reloaded.is_empty().await);
    }

    #[tokio::test]
    async fn test_guard_find_by_display_name() {
        let temp_dir = tempdir().unwrap();
        let index = MetadataIndex::new(temp_dir.path().join("metadata.json"));
        index
            .upsert(record("Invoice", Category::File, 1))
            .await
            .unwrap();

        let guard = index.write().await;
        assert!(guard.find("Invoice", Category::File).is_some());
        assert!(guard.find("Invoice", Category::Live).is_none());
        assert!(guard.contains("Invoice_0000abcd.zip"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_all_persisted() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("metadata.json");
        let index = Arc::new(MetadataIndex::new(&path));

        let mut handles = Vec::new();
        for i in 0..16 {
            let index = index.clone();
            handles.push(tokio::spawn(async move {
                index
                    .upsert(record(&format!("t{i}"), Category::Live, i))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let reloaded = MetadataIndex::new(&path);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.len().await, 16);
    }
}
