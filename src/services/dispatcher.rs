//! Fans a catalog page out over a fixed number of concurrent chunk workers.
//!
//! Items inside a chunk run in order; chunks run concurrently and are each
//! their own task, so a panic in one chunk is contained at the task boundary
//! and its siblings keep going. Counters are updated per item, which keeps
//! the work a chunk finished before aborting in the totals.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    models::{CatalogItem, Outcome, SyncSummary},
    services::{
        credential_service::CredentialManager,
        downloader::Downloader,
        reporter::{SyncEvent, SyncReporter},
    },
};

pub const DEFAULT_CHUNK_COUNT: usize = 10;

/// Per-outcome counters shared by every worker in a run.
#[derive(Debug, Default)]
pub struct SyncStats {
    downloaded: AtomicUsize,
    already_present: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    chunks_aborted: AtomicUsize,
}

impl SyncStats {
    pub fn record(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Downloaded => &self.downloaded,
            Outcome::AlreadyPresent => &self.already_present,
            Outcome::Skipped(_) => &self.skipped,
            Outcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::Relaxed)
    }

    pub fn already_present(&self) -> usize {
        self.already_present.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn chunks_aborted(&self) -> usize {
        self.chunks_aborted.load(Ordering::Relaxed)
    }

    /// Copy the item counters into `summary`.
    pub fn fill(&self, summary: &mut SyncSummary) {
        summary.downloaded = self.downloaded();
        summary.already_present = self.already_present();
        summary.skipped = self.skipped();
        summary.failed = self.failed();
        summary.chunks_aborted = self.chunks_aborted();
    }
}

pub struct Dispatcher {
    downloader: Arc<Downloader>,
    credentials: Arc<CredentialManager>,
    reporter: Arc<dyn SyncReporter>,
    stats: Arc<SyncStats>,
    chunk_count: usize,
}

impl Dispatcher {
    pub fn new(
        downloader: Arc<Downloader>,
        credentials: Arc<CredentialManager>,
        reporter: Arc<dyn SyncReporter>,
        chunk_count: usize,
    ) -> Self {
        Self {
            downloader,
            credentials,
            reporter,
            stats: Arc::new(SyncStats::default()),
            chunk_count: chunk_count.max(1),
        }
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Process one page. `first_position` is the 1-based catalog position of
    /// `items[0]`; `total` is the catalog size, both only used for reporting.
    ///
    /// Returns once every chunk has finished or aborted.
    pub async fn run(&self, items: Vec<CatalogItem>, first_position: usize, total: usize) {
        if items.is_empty() {
            return;
        }

        // Chunks of this page all start now, so this is the only point where
        // a refreshed credential can be handed out.
        self.credentials.refresh_if_due(self.reporter.as_ref()).await;
        let credential = self.credentials.current();

        let chunks = partition(items, self.chunk_count);
        let chunk_len = chunks.first().map_or(0, Vec::len);
        let mut handles = Vec::with_capacity(chunks.len());

        for (chunk_no, chunk) in chunks.into_iter().enumerate() {
            let downloader = self.downloader.clone();
            let credentials = self.credentials.clone();
            let reporter = self.reporter.clone();
            let stats = self.stats.clone();
            let credential = credential.clone();
            let first = first_position + chunk_no * chunk_len;

            let handle = tokio::spawn(async move {
                for (i, item) in chunk.iter().enumerate() {
                    let outcome = downloader.fetch(item, &credential).await;
                    credentials.record_processed();
                    stats.record(&outcome);
                    reporter.report(&SyncEvent::Item {
                        position: first + i,
                        total,
                        item,
                        outcome: &outcome,
                    });
                }
            });
            handles.push((chunk_no, handle));
        }

        for (chunk_no, handle) in handles {
            if let Err(err) = handle.await {
                self.stats.chunks_aborted.fetch_add(1, Ordering::Relaxed);
                self.reporter.report(&SyncEvent::ChunkAborted {
                    chunk: chunk_no,
                    reason: err.to_string(),
                });
            }
        }
    }
}

/// Split `items` into at most `chunk_count` contiguous, near-equal chunks.
/// Every chunk but the last has `ceil(len / chunk_count)` items.
pub fn partition<T>(items: Vec<T>, chunk_count: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let size = items.len().div_ceil(chunk_count.max(1));
    let mut chunks = Vec::with_capacity(chunk_count);
    let mut rest = items.into_iter();
    loop {
        let chunk: Vec<T> = rest.by_ref().take(size).collect();
        if chunk.is_empty() {
            break;
        }
        chunks.push(chunk);
    }
    chunks
}
