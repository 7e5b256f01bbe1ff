//! Per-item results and the run summary.

use std::fmt;

/// What happened to one catalog item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Downloaded,
    AlreadyPresent,
    Skipped(SkipReason),
    Failed(DownloadFailure),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The record has no object path.
    NoPath,
    /// The object path cannot be resolved or has no usable file name.
    MalformedPath,
    /// The group id is empty or not a single safe path segment.
    InvalidGroup,
    /// The group directory could not be created.
    DirError(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The response was not of the expected media type, typically an error
    /// document returned for a rejected signature.
    Unauthorized,
    Transport,
    Checksum,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl DownloadFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoPath => write!(f, "no object path"),
            SkipReason::MalformedPath => write!(f, "malformed object path"),
            SkipReason::InvalidGroup => write!(f, "invalid group id"),
            SkipReason::DirError(msg) => write!(f, "cannot create group directory: {msg}"),
        }
    }
}

/// Totals reported once a run finishes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Item count reported by the catalog.
    pub catalog_total: usize,
    pub pages: usize,
    pub pages_failed: usize,
    pub downloaded: usize,
    pub already_present: usize,
    pub skipped: usize,
    pub failed: usize,
    pub chunks_aborted: usize,
    pub deleted_files: usize,
    pub deleted_groups: usize,
    pub delete_failures: usize,
    pub sweep_ran: bool,
    pub marker_written: bool,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} photos downloaded, {} already present, {} skipped, {} failed, \
             {} photos deleted ({} groups deleted for no photo exists anymore)",
            self.downloaded,
            self.already_present,
            self.skipped,
            self.failed,
            self.deleted_files,
            self.deleted_groups
        )
    }
}
