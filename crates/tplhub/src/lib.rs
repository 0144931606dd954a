//! # tplhub
//!
//! A small template store that keeps three representations of a collection of
//! binary templates in step:
//! - the raw blobs, one directory per [`Category`]
//! - a metadata index persisted as a single JSON file
//! - a git history mirrored to a remote repository
//!
//! ## Core Concepts
//!
//! - **Records** are created once by [`TemplateStore::add`] and destroyed by
//!   [`TemplateStore::remove`], never partially updated
//! - **The index lock** serializes every mutation, including the blob write and
//!   the publish round-trip performed inside it
//! - **Publishing** is local-first: a failed commit or push is logged and the
//!   operation still succeeds
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tplhub::{FileBlobStorage, GitConfig, GitRepository, StoreConfig, TemplateStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig::new("templates");
//! let blobs = Arc::new(FileBlobStorage::new(&config.root));
//! let vcs = Arc::new(GitRepository::new(GitConfig::new(&config.root)));
//! let store = TemplateStore::open(config, blobs, vcs).await?;
//!
//! let outcome = store
//!     .add("file", "Invoice", "invoice.zip", b"PK\x03\x04".to_vec())
//!     .await?;
//! println!("stored {}", outcome.record.file_name);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod index;
pub mod record;
pub mod storage;
pub mod store;
pub mod vcs;

pub use error::{Result, StoreError};
pub use index::{IndexWriteGuard, MetadataIndex};
pub use record::{AssetRecord, Category};
pub use storage::{BlobStorage, FileBlobStorage, StorageError};
pub use store::{AddOutcome, RemoveOutcome, StoreConfig, TemplateStore};
pub use vcs::{
    CommitIdentity, GitConfig, GitRepository, GitStep, NoVersionControl, VersionControl,
    VersionControlError,
};
