//! Error types for the sync engine.
//!
//! Each concern gets its own enum so callers can decide at which unit
//! (item, page, chunk, run) a failure is contained. Only [`SyncError`] ever
//! escapes a run.

use std::io;
use thiserror::Error;

/// Fatal, run-level failures.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(#[source] CatalogError),
    #[error("failed to prepare mirror root: {0}")]
    MirrorRoot(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog returned status {0}")]
    Status(u16),
    #[error("catalog reported no photos")]
    Empty,
    #[error("invalid catalog url: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("credential endpoint returned status {0}")]
    Status(u16),
    #[error("malformed credential payload: {0}")]
    Malformed(String),
}

/// An object URL that cannot be split into region, bucket and key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed object path `{url}`: {reason}")]
pub struct MalformedPathError {
    pub url: String,
    pub reason: &'static str,
}

impl MalformedPathError {
    pub fn new(url: &str, reason: &'static str) -> Self {
        Self {
            url: url.to_string(),
            reason,
        }
    }
}

#[derive(Debug, Error)]
pub enum SignError {
    #[error("invalid storage endpoint: {0}")]
    Endpoint(String),
    #[error("invalid signing key")]
    Key,
    #[error("signature validity window out of range")]
    Window,
}

/// Failures while fetching a single object. Converted into an item outcome by
/// the downloader, never propagated further.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Sign(#[from] SignError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("storage returned status {0}")]
    Status(u16),
    #[error("unexpected content type `{0}`")]
    ContentType(String),
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Checksum { expected: String, actual: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}
