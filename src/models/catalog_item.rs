//! Represents a photo record read from the remote catalog.

use serde::Deserialize;

/// A single catalog record, normalized into a fixed shape.
///
/// Items are immutable once read; the remote catalog is the source of truth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogItem {
    /// Opaque identifier, unique within the catalog.
    pub id: String,

    /// Category / owner key. Used as the mirror subdirectory name.
    pub group_id: String,

    /// Storage URL of the object, empty when the record has none.
    pub object_path: String,
}

impl CatalogItem {
    pub fn new(
        id: impl Into<String>,
        group_id: impl Into<String>,
        object_path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            group_id: group_id.into(),
            object_path: object_path.into(),
        }
    }

    /// Last `/`-separated segment of the object path.
    pub fn file_name(&self) -> &str {
        self.object_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.object_path)
    }
}

/// Record as it appears on the wire. Every field may be missing or null.
#[derive(Deserialize, Debug, Default)]
pub struct PhotoRecord {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,

    #[serde(rename = "cat_id", default)]
    pub group_id: Option<String>,

    #[serde(rename = "photo_compressed", default)]
    pub object_path: Option<String>,
}

impl From<PhotoRecord> for CatalogItem {
    fn from(record: PhotoRecord) -> Self {
        Self {
            id: record.id.unwrap_or_default(),
            group_id: record.group_id.unwrap_or_default(),
            object_path: record.object_path.unwrap_or_default(),
        }
    }
}
