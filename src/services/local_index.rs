//! In-memory index of the files already present in the mirror.
//!
//! The index is built once per run, confirmed concurrently by download
//! workers, and consumed by the cleanup sweep. Layout on disk is
//! `root/{group_id}/{file_name}`.

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio::fs;
use tracing::debug;

use crate::{
    models::LocalEntry,
    services::reporter::{SyncEvent, SyncReporter},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted_files: usize,
    pub deleted_groups: usize,
    pub failures: usize,
}

#[derive(Debug)]
pub struct LocalIndex {
    root: PathBuf,
    entries: Mutex<HashMap<String, LocalEntry>>,
}

impl LocalIndex {
    /// Scan `root`, creating it if absent.
    ///
    /// Only files inside immediate subdirectories are indexed; anything at the
    /// root level or nested deeper is ignored. Only creating or listing the
    /// root is an error. A group that cannot be read is reported and left out
    /// of the index, so the sweep never touches it.
    pub async fn scan(
        root: impl Into<PathBuf>,
        reporter: &dyn SyncReporter,
    ) -> std::io::Result<Self> {
        let root = root.into();
        let mut entries = HashMap::new();
        let mut groups = 0usize;

        if !fs::try_exists(&root).await? {
            fs::create_dir_all(&root).await?;
        } else {
            let mut dirs = fs::read_dir(&root).await?;
            while let Some(dir) = dirs.next_entry().await? {
                let path = dir.path();
                match dir.file_type().await {
                    Ok(file_type) if file_type.is_dir() => {}
                    Ok(_) => continue,
                    Err(error) => {
                        reporter.report(&SyncEvent::ScanFailed {
                            path: &path,
                            error: &error,
                        });
                        continue;
                    }
                }
                let Ok(group_id) = dir.file_name().into_string() else {
                    debug!("skipping non-utf8 group {}", path.display());
                    continue;
                };

                let file_names = match scan_group(&path).await {
                    Ok(file_names) => file_names,
                    Err(error) => {
                        reporter.report(&SyncEvent::ScanFailed {
                            path: &path,
                            error: &error,
                        });
                        continue;
                    }
                };
                groups += 1;

                for file_name in file_names {
                    let entry = LocalEntry::new(file_name.clone(), group_id.clone());
                    if let Some(previous) = entries.insert(file_name.clone(), entry) {
                        reporter.report(&SyncEvent::DuplicateFileName {
                            file_name: &file_name,
                            kept_group: &group_id,
                            dropped_group: &previous.group_id,
                        });
                    }
                }
            }
        }

        reporter.report(&SyncEvent::ScanCompleted {
            files: entries.len(),
            groups,
        });

        Ok(Self {
            root,
            entries: Mutex::new(entries),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, file_name: &str) -> Option<LocalEntry> {
        self.lock().get(file_name).cloned()
    }

    /// Mark `file_name` as still referenced by the catalog. No-op if absent.
    pub fn confirm(&self, file_name: &str) {
        if let Some(entry) = self.lock().get_mut(file_name) {
            entry.confirmed = true;
        }
    }

    /// Delete every unconfirmed file, then every group directory left empty.
    ///
    /// Individual failures are reported and counted; the sweep always visits
    /// every entry.
    pub async fn sweep_unconfirmed(&self, reporter: &dyn SyncReporter) -> SweepReport {
        let mut report = SweepReport::default();

        let mut orphans: Vec<LocalEntry> = self
            .lock()
            .values()
            .filter(|entry| !entry.confirmed)
            .cloned()
            .collect();
        orphans.sort_by(|a, b| (&a.group_id, &a.file_name).cmp(&(&b.group_id, &b.file_name)));

        for entry in orphans {
            let path = self.root.join(&entry.group_id).join(&entry.file_name);
            match fs::remove_file(&path).await {
                Ok(()) => {
                    report.deleted_files += 1;
                    self.lock().remove(&entry.file_name);
                    reporter.report(&SyncEvent::FileDeleted { path: &path });
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("file {} already missing", path.display());
                    self.lock().remove(&entry.file_name);
                }
                Err(err) => {
                    report.failures += 1;
                    reporter.report(&SyncEvent::DeleteFailed {
                        path: &path,
                        error: &err,
                    });
                }
            }
        }

        self.prune_empty_groups(reporter, &mut report).await;
        report
    }

    /// Remove group directories that hold nothing.
    async fn prune_empty_groups(&self, reporter: &dyn SyncReporter, report: &mut SweepReport) {
        let mut dirs = match fs::read_dir(&self.root).await {
            Ok(dirs) => dirs,
            Err(err) => {
                report.failures += 1;
                reporter.report(&SyncEvent::DeleteFailed {
                    path: &self.root,
                    error: &err,
                });
                return;
            }
        };

        loop {
            let dir = match dirs.next_entry().await {
                Ok(Some(dir)) => dir,
                Ok(None) => break,
                Err(err) => {
                    report.failures += 1;
                    reporter.report(&SyncEvent::DeleteFailed {
                        path: &self.root,
                        error: &err,
                    });
                    break;
                }
            };
            let is_dir = dir.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }

            let path = dir.path();
            match fs::remove_dir(&path).await {
                Ok(()) => {
                    report.deleted_groups += 1;
                    reporter.report(&SyncEvent::GroupDeleted { path: &path });
                }
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    report.failures += 1;
                    reporter.report(&SyncEvent::DeleteFailed {
                        path: &path,
                        error: &err,
                    });
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, LocalEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Names of the regular files directly inside one group directory.
async fn scan_group(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut files = fs::read_dir(dir).await?;
    while let Some(file) = files.next_entry().await? {
        if !file.file_type().await?.is_file() {
            continue;
        }
        match file.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(_) => debug!("skipping non-utf8 file {}", file.path().display()),
        }
    }
    Ok(names)
}
