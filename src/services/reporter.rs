//! Structured progress events and the observer that receives them.
//!
//! The engine never formats output itself. Every item, page, chunk and
//! cleanup decision is emitted as a [`SyncEvent`], so a run can be audited
//! afterwards from the log alone.

use chrono::{DateTime, Utc};
use std::{io, path::Path};
use tracing::{debug, error, info, warn};

use crate::{
    errors::{CatalogError, CredentialError},
    models::{CatalogItem, Outcome, SyncSummary},
};

#[derive(Debug)]
pub enum SyncEvent<'a> {
    ScanCompleted {
        files: usize,
        groups: usize,
    },
    /// A group directory that could not be read; its files are not indexed.
    ScanFailed {
        path: &'a Path,
        error: &'a io::Error,
    },
    /// Two local files share a name; the later one replaced the earlier in
    /// the index.
    DuplicateFileName {
        file_name: &'a str,
        kept_group: &'a str,
        dropped_group: &'a str,
    },
    CatalogCounted {
        total: usize,
        pages: usize,
    },
    PageFailed {
        page: usize,
        offset: usize,
        error: &'a CatalogError,
    },
    Item {
        /// 1-based position in the catalog.
        position: usize,
        total: usize,
        item: &'a CatalogItem,
        outcome: &'a Outcome,
    },
    ChunkAborted {
        chunk: usize,
        reason: String,
    },
    CredentialRefreshed {
        expires_at: DateTime<Utc>,
    },
    CredentialRefreshFailed {
        error: &'a CredentialError,
    },
    FileDeleted {
        path: &'a Path,
    },
    GroupDeleted {
        path: &'a Path,
    },
    DeleteFailed {
        path: &'a Path,
        error: &'a io::Error,
    },
    SweepSkipped {
        pages_failed: usize,
    },
    MarkerFailed {
        path: &'a Path,
        error: &'a io::Error,
    },
    Finished {
        summary: &'a SyncSummary,
    },
}

pub trait SyncReporter: Send + Sync {
    fn report(&self, event: &SyncEvent<'_>);
}

/// Default reporter: one `tracing` line per event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl SyncReporter for TracingReporter {
    fn report(&self, event: &SyncEvent<'_>) {
        match event {
            SyncEvent::ScanCompleted { files, groups } => {
                info!(files, groups, "scanned local mirror");
            }
            SyncEvent::ScanFailed { path, error } => {
                warn!(path = %path.display(), %error, "cannot read group directory, leaving it untouched");
            }
            SyncEvent::DuplicateFileName {
                file_name,
                kept_group,
                dropped_group,
            } => {
                warn!(file_name, kept_group, dropped_group, "duplicate file name in mirror");
            }
            SyncEvent::CatalogCounted { total, pages } => {
                info!(total, pages, "found photos in catalog");
            }
            SyncEvent::PageFailed {
                page,
                offset,
                error,
            } => {
                error!(page, offset, %error, "failed to fetch catalog page, skipping");
            }
            SyncEvent::Item {
                position,
                total,
                item,
                outcome,
            } => report_item(*position, *total, item, outcome),
            SyncEvent::ChunkAborted { chunk, reason } => {
                error!(chunk, reason = %reason, "download chunk aborted");
            }
            SyncEvent::CredentialRefreshed { expires_at } => {
                info!(%expires_at, "storage credential refreshed");
            }
            SyncEvent::CredentialRefreshFailed { error } => {
                warn!(%error, "credential refresh failed, keeping previous credential");
            }
            SyncEvent::FileDeleted { path } => {
                info!(path = %path.display(), "deleted orphaned photo");
            }
            SyncEvent::GroupDeleted { path } => {
                info!(path = %path.display(), "deleted empty group directory");
            }
            SyncEvent::DeleteFailed { path, error } => {
                error!(path = %path.display(), %error, "failed to delete");
            }
            SyncEvent::SweepSkipped { pages_failed } => {
                warn!(
                    pages_failed,
                    "catalog incomplete, skipping cleanup to avoid deleting unexamined photos"
                );
            }
            SyncEvent::MarkerFailed { path, error } => {
                warn!(path = %path.display(), %error, "failed to write completion marker");
            }
            SyncEvent::Finished { summary } => {
                info!("Done. {summary}");
            }
        }
    }
}

fn report_item(position: usize, total: usize, item: &CatalogItem, outcome: &Outcome) {
    let group = item.group_id.as_str();
    let path = item.object_path.as_str();
    match outcome {
        Outcome::Downloaded => info!(position, total, group, path, "downloaded"),
        Outcome::AlreadyPresent => debug!(position, total, group, path, "already downloaded"),
        Outcome::Skipped(reason) => {
            warn!(position, total, group, path, reason = %reason, "skipped")
        }
        Outcome::Failed(failure) => error!(
            position,
            total,
            group,
            path,
            kind = ?failure.kind,
            message = %failure.message,
            "failed download"
        ),
    }
}
