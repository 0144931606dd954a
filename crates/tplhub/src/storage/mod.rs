//! Storage abstraction for template blobs

pub mod blob_storage;
pub mod file_storage;

pub use blob_storage::{BlobStorage, StorageError};
pub use file_storage::FileBlobStorage;
