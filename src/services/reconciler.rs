//! End-of-run cleanup and completion marker.

use std::path::PathBuf;
use tokio::fs;

use crate::services::{
    local_index::{LocalIndex, SweepReport},
    reporter::{SyncEvent, SyncReporter},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// `None` when the sweep was skipped.
    pub sweep: Option<SweepReport>,
    pub marker_written: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Reconciler {
    /// Sweep even when some catalog pages could not be read.
    sweep_on_partial: bool,
    marker_path: Option<PathBuf>,
}

impl Reconciler {
    pub fn new(sweep_on_partial: bool, marker_path: Option<PathBuf>) -> Self {
        Self {
            sweep_on_partial,
            marker_path,
        }
    }

    /// Run once, after the page loop.
    ///
    /// A page that failed to load leaves the local copies of its items
    /// unconfirmed, which looks exactly like those items having been removed
    /// from the catalog. Unless told otherwise, nothing is deleted when that
    /// happened.
    pub async fn reconcile(
        &self,
        index: &LocalIndex,
        pages_failed: usize,
        reporter: &dyn SyncReporter,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        if pages_failed == 0 || self.sweep_on_partial {
            report.sweep = Some(index.sweep_unconfirmed(reporter).await);
        } else {
            reporter.report(&SyncEvent::SweepSkipped { pages_failed });
        }

        if pages_failed == 0 {
            if let Some(path) = &self.marker_path {
                match fs::write(path, b"").await {
                    Ok(()) => report.marker_written = true,
                    Err(error) => reporter.report(&SyncEvent::MarkerFailed {
                        path,
                        error: &error,
                    }),
                }
            }
        }

        report
    }
}
