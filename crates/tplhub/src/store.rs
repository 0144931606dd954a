//! Store coordinator
//!
//! Sequences one logical add or remove across the blob area, the metadata
//! index and the version history. The index's exclusive section is held for
//! the whole sequence, publish included, so mutations are totally ordered.
//!
//! Steps are not rolled back. A failed index rewrite after a blob mutation
//! surfaces as [`StoreError::StorageIntegrity`]; a failed publish is only
//! logged and reported in the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::index::MetadataIndex;
use crate::record::{AssetRecord, Category, blob_key};
use crate::storage::BlobStorage;
use crate::vcs::{VersionControl, VersionControlError};

/// Length of the random part of generated file names
const SUFFIX_LEN: usize = 8;

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Working tree root holding the category directories and the index
    pub root: PathBuf,

    /// Index file name, relative to `root`
    pub index_file: String,

    /// The single accepted payload extension, including the dot
    pub allowed_extension: String,
}

impl StoreConfig {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            index_file: "metadata.json".to_string(),
            allowed_extension: ".zip".to_string(),
        }
    }

    pub fn with_index_file(mut self, index_file: impl Into<String>) -> Self {
        self.index_file = index_file.into();
        self
    }

    pub fn with_allowed_extension(mut self, extension: impl Into<String>) -> Self {
        self.allowed_extension = extension.into();
        self
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(&self.index_file)
    }
}

/// Result of a successful add
#[derive(Debug)]
pub struct AddOutcome {
    pub record: AssetRecord,
    /// Set when the change is durable locally but was not published
    pub publish_error: Option<VersionControlError>,
}

/// Result of a successful remove
#[derive(Debug)]
pub struct RemoveOutcome {
    pub record: AssetRecord,
    pub publish_error: Option<VersionControlError>,
}

/// Coordinates blob writes, index updates and history commits
pub struct TemplateStore {
    config: StoreConfig,
    index: MetadataIndex,
    blobs: Arc<dyn BlobStorage>,
    vcs: Arc<dyn VersionControl>,
}

impl TemplateStore {
    /// Build a store without touching the disk. See [`open`](Self::open).
    pub fn new(
        config: StoreConfig,
        blobs: Arc<dyn BlobStorage>,
        vcs: Arc<dyn VersionControl>,
    ) -> Self {
        let index = MetadataIndex::new(config.index_path());
        Self {
            config,
            index,
            blobs,
            vcs,
        }
    }

    /// Bootstrap the working tree, create the category directories and load
    /// the index
    ///
    /// A version control failure is only logged. An unreadable index is
    /// returned so the caller can abort startup.
    pub async fn open(
        config: StoreConfig,
        blobs: Arc<dyn BlobStorage>,
        vcs: Arc<dyn VersionControl>,
    ) -> Result<Self> {
        let store = Self::new(config, blobs, vcs);

        if let Err(e) = store.vcs.ensure_initialized().await {
            warn!("Failed to initialize git repository: {}", e);
        }
        store.blobs.ensure_layout().await?;
        store.index.load().await?;

        info!(
            "Template store ready at {} ({} templates)",
            store.config.root.display(),
            store.index.len().await
        );
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn index(&self) -> &MetadataIndex {
        &self.index
    }

    /// Records ordered newest first, optionally restricted to one category
    pub async fn list(&self, category: Option<&str>) -> Result<Vec<AssetRecord>> {
        let category = category.map(str::parse::<Category>).transpose()?;
        Ok(self.index.list(category).await)
    }

    /// Path of a stored blob, for streaming it back to a client
    pub async fn fetch_blob_path(&self, category: &str, file_name: &str) -> Result<PathBuf> {
        let category: Category = category.parse()?;
        let key = self.existing_blob_key(category, file_name).await?;
        Ok(self.blobs.path(&key)?)
    }

    /// Store a new template
    ///
    /// `original_file_name` only contributes its extension.
    pub async fn add(
        &self,
        category: &str,
        display_name: &str,
        original_file_name: &str,
        payload: Vec<u8>,
    ) -> Result<AddOutcome> {
        let category: Category = category.parse()?;
        validate_display_name(display_name)?;
        let extension = self.accepted_extension(original_file_name)?;
        let mut file_name = generate_file_name(display_name, &extension);

        let mut guard = self.index.write().await;

        if guard.find(display_name, category).is_some() {
            return Err(StoreError::Conflict {
                display_name: display_name.to_string(),
                category,
            });
        }
        // Keys are global across categories.
        while guard.contains(&file_name) {
            file_name = generate_file_name(display_name, &extension);
        }
        let key = blob_key(category, &file_name);

        self.blobs.put(&key, payload).await?;

        let record = AssetRecord::new(display_name, &file_name, category);
        guard.upsert(record.clone()).await?;

        let publish_error = self
            .publish(key, format!("Add {} template: {}", category, file_name))
            .await;
        drop(guard);

        info!("Added {} template {}", category, file_name);
        Ok(AddOutcome {
            record,
            publish_error,
        })
    }

    /// Delete a template
    ///
    /// The index decides eligibility: a blob with no index entry is left alone.
    pub async fn remove(&self, category: &str, file_name: &str) -> Result<RemoveOutcome> {
        let category: Category = category.parse()?;
        let key = self.existing_blob_key(category, file_name).await?;

        let mut guard = self.index.write().await;

        let record = guard
            .get(file_name)
            .filter(|r| r.category == category)
            .cloned()
            .ok_or_else(|| {
                StoreError::not_found(format!("Template metadata not found: {}", file_name))
            })?;

        self.blobs.delete(&key).await?;
        guard.remove(file_name).await?;

        let publish_error = self
            .publish(key, format!("Delete {} template: {}", category, file_name))
            .await;
        drop(guard);

        info!("Removed {} template {}", category, file_name);
        Ok(RemoveOutcome {
            record,
            publish_error,
        })
    }

    async fn existing_blob_key(&self, category: Category, file_name: &str) -> Result<String> {
        if !is_plain_file_name(file_name) {
            return Err(StoreError::not_found(file_name));
        }
        let key = blob_key(category, file_name);
        if !self.blobs.exists(&key).await? {
            return Err(StoreError::not_found(format!("{}/{}", category, file_name)));
        }
        Ok(key)
    }

    fn accepted_extension(&self, original_file_name: &str) -> Result<String> {
        let allowed = &self.config.allowed_extension;
        let extension = Path::new(original_file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e));

        match extension {
            Some(ext) if ext.eq_ignore_ascii_case(allowed) => Ok(allowed.clone()),
            _ => Err(StoreError::UnsupportedMediaType(format!(
                "Only {} files are allowed",
                allowed
            ))),
        }
    }

    /// Publish the blob change together with the index file
    async fn publish(&self, key: String, message: String) -> Option<VersionControlError> {
        let paths = [key, self.config.index_file.clone()];
        match self.vcs.publish(&paths, &message).await {
            Ok(()) => {
                debug!("Published '{}'", message);
                None
            }
            Err(e) => {
                warn!("Failed to publish '{}': {}", message, e);
                Some(e)
            }
        }
    }
}

fn validate_display_name(display_name: &str) -> Result<()> {
    if display_name.trim().is_empty() {
        return Err(StoreError::invalid_request("Display name is required"));
    }
    if !is_plain_file_name(display_name) {
        return Err(StoreError::invalid_request(format!(
            "Display name must not contain path separators: {}",
            display_name
        )));
    }
    Ok(())
}

/// A single path component that is neither `.` nor `..`
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
}

/// `<display_name>_<8 hex chars><extension>`
fn generate_file_name(display_name: &str, extension: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}{}", display_name, &suffix[..SUFFIX_LEN], extension)
}
