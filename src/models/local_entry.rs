//! Represents a file found in the local mirror.

/// A mirrored file, keyed by `file_name` in the local index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalEntry {
    pub file_name: String,

    /// Name of the directory the file was found under.
    pub group_id: String,

    /// Set once the current catalog is known to still reference the file.
    pub confirmed: bool,
}

impl LocalEntry {
    pub fn new(file_name: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            group_id: group_id.into(),
            confirmed: false,
        }
    }
}
