//! Asset records and categories

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::StoreError;

/// The fixed classification of stored templates
///
/// Each category owns a blob directory of the same name under the working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Live,
    File,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Live, Category::File];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Live => "live",
            Category::File => "file",
        }
    }

    /// Directory holding this category's blobs, relative to the working tree
    pub fn dir_name(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(Category::Live),
            "file" => Ok(Category::File),
            other => Err(StoreError::invalid_request(format!(
                "Invalid template type: {other}"
            ))),
        }
    }
}

/// One entry of the metadata index
///
/// Field names on disk follow the existing `metadata.json` layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub display_name: String,
    pub file_name: String,
    #[serde(rename = "type")]
    pub category: Category,
    /// Seconds since the Unix epoch
    #[serde(rename = "createTime")]
    pub created_at: i64,
}

impl AssetRecord {
    /// Create a record stamped with the current time
    pub fn new(
        display_name: impl Into<String>,
        file_name: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            file_name: file_name.into(),
            category,
            created_at: OffsetDateTime::now_utc().unix_timestamp(),
        }
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Blob key relative to the working tree, e.g. `file/Invoice_1a2b3c4d.zip`
    pub fn blob_key(&self) -> String {
        blob_key(self.category, &self.file_name)
    }

    /// Listing order: newest first, then display name ascending
    pub fn listing_order(a: &AssetRecord, b: &AssetRecord) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.display_name.cmp(&b.display_name))
    }
}

pub(crate) fn blob_key(category: Category, file_name: &str) -> String {
    format!("{}/{}", category.dir_name(), file_name)
}
