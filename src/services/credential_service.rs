//! Obtains and refreshes the temporary storage credential.
//!
//! Refresh policy: once before the run, then at the first check after the
//! processed count crosses each multiple of `refresh_interval`, or when the
//! current credential has already expired.
//!
//! The counted cadence is a heuristic safety margin, not a correctness
//! guarantee. It is not derived from `expires_at`, and chunks that are
//! already running keep the credential they were dispatched with, so a slow
//! enough page can still sign requests with an expired credential. Those
//! requests fail per item.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::sync::{
    Arc, RwLock,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    errors::CredentialError,
    models::{Credential, CredentialPayload},
    services::reporter::{SyncEvent, SyncReporter},
};

#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch(&self) -> Result<Credential, CredentialError>;
}

/// POSTs to the credential-issuing endpoint.
#[derive(Clone, Debug)]
pub struct HttpCredentialSource {
    client: Client,
    url: String,
}

impl HttpCredentialSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    async fn fetch(&self) -> Result<Credential, CredentialError> {
        let response = self.client.post(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(CredentialError::Status(response.status().as_u16()));
        }
        let body = response.bytes().await?;
        let payload: CredentialPayload = serde_json::from_slice(&body)
            .map_err(|e| CredentialError::Malformed(e.to_string()))?;
        Credential::try_from(payload)
    }
}

pub struct CredentialManager {
    source: Arc<dyn CredentialSource>,
    current: RwLock<Arc<Credential>>,
    /// 0 disables the counted cadence.
    refresh_interval: usize,
    processed: AtomicUsize,
    processed_at_refresh: AtomicUsize,
}

impl CredentialManager {
    pub fn new(source: Arc<dyn CredentialSource>, refresh_interval: usize) -> Self {
        Self {
            source,
            current: RwLock::new(Arc::new(Credential::placeholder())),
            refresh_interval,
            processed: AtomicUsize::new(0),
            processed_at_refresh: AtomicUsize::new(0),
        }
    }

    /// Initial fetch. On failure the placeholder stays in place and the run
    /// continues; downloads then fail individually.
    pub async fn initialize(&self, reporter: &dyn SyncReporter) -> bool {
        self.refresh(reporter).await
    }

    /// Snapshot of the credential to hand to newly dispatched work.
    pub fn current(&self) -> Arc<Credential> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Count one processed item. Returns the running total.
    pub fn record_processed(&self) -> usize {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn refresh_due(&self) -> bool {
        if self.current().is_stale(Utc::now()) {
            return true;
        }
        if self.refresh_interval == 0 {
            return false;
        }
        // Due once per multiple of the interval, counted from the start of
        // the run rather than from the last refresh.
        let last = self.processed_at_refresh.load(Ordering::Relaxed);
        self.processed() / self.refresh_interval > last / self.refresh_interval
    }

    /// Refresh if due. Returns true when a new credential was installed.
    pub async fn refresh_if_due(&self, reporter: &dyn SyncReporter) -> bool {
        if !self.refresh_due() {
            return false;
        }
        self.refresh(reporter).await
    }

    async fn refresh(&self, reporter: &dyn SyncReporter) -> bool {
        let processed = self.processed();
        match self.source.fetch().await {
            Ok(credential) => {
                reporter.report(&SyncEvent::CredentialRefreshed {
                    expires_at: credential.expires_at,
                });
                let fresh = Arc::new(credential);
                match self.current.write() {
                    Ok(mut guard) => *guard = fresh,
                    Err(poisoned) => *poisoned.into_inner() = fresh,
                }
                self.processed_at_refresh.store(processed, Ordering::Relaxed);
                true
            }
            Err(error) => {
                reporter.report(&SyncEvent::CredentialRefreshFailed { error: &error });
                false
            }
        }
    }
}
