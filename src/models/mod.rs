//! Core data models for the photo mirror.
//!
//! Catalog records, local index entries, credentials and the results the
//! engine produces for each item and each run.

pub mod bucket_location;
pub mod catalog_item;
pub mod credential;
pub mod local_entry;
pub mod outcome;

pub use bucket_location::BucketLocation;
pub use catalog_item::{CatalogItem, PhotoRecord};
pub use credential::{Credential, CredentialPayload};
pub use local_entry::LocalEntry;
pub use outcome::{DownloadFailure, FailureKind, Outcome, SkipReason, SyncSummary};
