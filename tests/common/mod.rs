#![allow(dead_code)]
//! Shared fixtures: in-memory catalog, fixed credentials and a mock bucket.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use photo_mirror::{
    errors::{CatalogError, CredentialError},
    models::{CatalogItem, Credential},
    services::{
        catalog_service::Catalog, credential_service::CredentialSource,
        object_storage::CosSigner,
    },
};
use std::{
    collections::HashSet,
    path::Path,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path_regex},
};

pub const BUCKET: &str = "photos-1250000000";

/// Virtual-hosted URL for `key` in the test bucket.
pub fn object_url(key: &str) -> String {
    format!("https://{BUCKET}.cos.ap-guangzhou.myqcloud.com/{key}")
}

pub fn item(id: usize, group: &str, key: &str) -> CatalogItem {
    CatalogItem::new(format!("p{id}"), group, object_url(key))
}

/// Serves `image/jpeg` bodies for every key under `compressed/`.
pub async fn mount_images(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(format!("^/{BUCKET}/compressed/.+")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"jpeg-bytes".to_vec(), "image/jpeg"))
        .mount(server)
        .await;
}

/// Answers keys under `broken/` the way a rejected signature is answered.
pub async fn mount_denied(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(format!("^/{BUCKET}/broken/.+")))
        .respond_with(
            ResponseTemplate::new(403).set_body_raw(b"<Error>AccessDenied</Error>".to_vec(), "application/xml"),
        )
        .mount(server)
        .await;
}

pub fn signer(server: &MockServer) -> CosSigner {
    CosSigner::new(Duration::seconds(900))
        .with_endpoint(&server.uri())
        .unwrap()
}

pub fn seed_file(root: &Path, group: &str, name: &str) {
    let dir = root.join(group);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), b"old").unwrap();
}

pub struct MemoryCatalog {
    items: Vec<CatalogItem>,
    failing_pages: HashSet<usize>,
    pub requests: Mutex<Vec<(usize, usize)>>,
}

impl MemoryCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items,
            failing_pages: HashSet::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Pages are identified by their offset.
    pub fn failing_at(mut self, offset: usize) -> Self {
        self.failing_pages.insert(offset);
        self
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn count(&self) -> Result<usize, CatalogError> {
        if self.items.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(self.items.len())
    }

    async fn page(&self, offset: usize, limit: usize) -> Result<Vec<CatalogItem>, CatalogError> {
        self.requests.lock().unwrap().push((offset, limit));
        if self.failing_pages.contains(&offset) {
            return Err(CatalogError::Status(500));
        }
        let start = offset.min(self.items.len());
        let end = (offset + limit).min(self.items.len());
        Ok(self.items[start..end].to_vec())
    }
}

/// Hands out hour-long credentials and counts how often it was asked.
#[derive(Default)]
pub struct FixedCredentials {
    pub calls: AtomicUsize,
}

impl FixedCredentials {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for FixedCredentials {
    async fn fetch(&self) -> Result<Credential, CredentialError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Credential {
            secret_id: format!("AKID{n}"),
            secret_key: "secret".into(),
            session_token: "token".into(),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
