//! Drives one full mirror run.
//!
//! scan mirror → fetch credential → count catalog → page loop (dispatch each
//! page, sequentially) → reconcile → summary.

use reqwest::Client;
use std::{path::PathBuf, sync::Arc};

use crate::{
    errors::SyncError,
    models::SyncSummary,
    services::{
        catalog_service::{Catalog, page_count},
        credential_service::{CredentialManager, CredentialSource},
        dispatcher::{DEFAULT_CHUNK_COUNT, Dispatcher},
        downloader::{DEFAULT_CONTENT_PREFIX, Downloader},
        local_index::LocalIndex,
        object_storage::ObjectStorage,
        reconciler::Reconciler,
        reporter::{SyncEvent, SyncReporter},
    },
};

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_REFRESH_INTERVAL: usize = 500;

#[derive(Clone, Debug)]
pub struct SyncOptions {
    pub mirror_root: PathBuf,
    pub page_size: usize,
    pub chunk_count: usize,
    /// Items processed between credential refreshes; 0 disables.
    pub refresh_interval: usize,
    pub content_prefix: String,
    pub sweep_on_partial: bool,
    pub marker_path: Option<PathBuf>,
}

impl SyncOptions {
    pub fn new(mirror_root: impl Into<PathBuf>) -> Self {
        Self {
            mirror_root: mirror_root.into(),
            page_size: DEFAULT_PAGE_SIZE,
            chunk_count: DEFAULT_CHUNK_COUNT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            content_prefix: DEFAULT_CONTENT_PREFIX.to_string(),
            sweep_on_partial: false,
            marker_path: None,
        }
    }
}

#[derive(Clone)]
pub struct SyncService {
    catalog: Arc<dyn Catalog>,
    credential_source: Arc<dyn CredentialSource>,
    storage: Arc<dyn ObjectStorage>,
    client: Client,
    reporter: Arc<dyn SyncReporter>,
    options: SyncOptions,
}

impl SyncService {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        credential_source: Arc<dyn CredentialSource>,
        storage: Arc<dyn ObjectStorage>,
        client: Client,
        reporter: Arc<dyn SyncReporter>,
        options: SyncOptions,
    ) -> Self {
        Self {
            catalog,
            credential_source,
            storage,
            client,
            reporter,
            options,
        }
    }

    /// Run one full reconciliation.
    ///
    /// Only an unusable mirror root or an unavailable catalog count fail the
    /// run; everything else is reported and counted.
    pub async fn run(&self) -> Result<SyncSummary, SyncError> {
        let reporter = self.reporter.as_ref();
        let page_size = self.options.page_size.max(1);

        let index = Arc::new(
            LocalIndex::scan(&self.options.mirror_root, reporter)
                .await
                .map_err(SyncError::MirrorRoot)?,
        );

        let credentials = Arc::new(CredentialManager::new(
            self.credential_source.clone(),
            self.options.refresh_interval,
        ));
        credentials.initialize(reporter).await;

        let total = self
            .catalog
            .count()
            .await
            .map_err(SyncError::CatalogUnavailable)?;
        let pages = page_count(total, page_size);
        reporter.report(&SyncEvent::CatalogCounted { total, pages });

        let downloader = Arc::new(Downloader::new(
            self.client.clone(),
            self.storage.clone(),
            index.clone(),
            self.options.content_prefix.clone(),
        ));
        let dispatcher = Dispatcher::new(
            downloader,
            credentials,
            self.reporter.clone(),
            self.options.chunk_count,
        );

        let mut pages_failed = 0;
        for page in 0..pages {
            let offset = page * page_size;
            match self.catalog.page(offset, page_size).await {
                Ok(items) => dispatcher.run(items, offset + 1, total).await,
                Err(error) => {
                    pages_failed += 1;
                    reporter.report(&SyncEvent::PageFailed {
                        page,
                        offset,
                        error: &error,
                    });
                }
            }
        }

        let reconciled = Reconciler::new(
            self.options.sweep_on_partial,
            self.options.marker_path.clone(),
        )
        .reconcile(&index, pages_failed, reporter)
        .await;

        let mut summary = SyncSummary {
            catalog_total: total,
            pages,
            pages_failed,
            marker_written: reconciled.marker_written,
            ..SyncSummary::default()
        };
        dispatcher.stats().fill(&mut summary);
        if let Some(sweep) = reconciled.sweep {
            summary.sweep_ran = true;
            summary.deleted_files = sweep.deleted_files;
            summary.deleted_groups = sweep.deleted_groups;
            summary.delete_failures = sweep.failures;
        }

        reporter.report(&SyncEvent::Finished { summary: &summary });
        Ok(summary)
    }
}
