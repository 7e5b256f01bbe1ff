//! Chunked dispatch: isolation between chunks and counted credential refresh.

mod common;

use common::{FixedCredentials, files_in, item, mount_denied, mount_images, signer};
use photo_mirror::{
    errors::SignError,
    models::{BucketLocation, CatalogItem, Credential},
    services::{
        credential_service::CredentialManager,
        dispatcher::Dispatcher,
        downloader::Downloader,
        local_index::LocalIndex,
        object_storage::{CosSigner, ObjectStorage},
        reporter::TracingReporter,
    },
};
use reqwest::{Client, Url};
use std::{path::Path, sync::Arc};
use tempfile::TempDir;
use wiremock::MockServer;

/// Signs like the mock bucket but panics on one key.
struct PanicOnKey {
    signer: CosSigner,
    key: &'static str,
}

impl ObjectStorage for PanicOnKey {
    fn signed_url(
        &self,
        location: &BucketLocation,
        credential: &Credential,
    ) -> Result<Url, SignError> {
        if location.key == self.key {
            panic!("cannot sign {}", self.key);
        }
        self.signer.signed_url(location, credential)
    }
}

async fn dispatcher(
    root: &Path,
    server: &MockServer,
    credentials: Arc<FixedCredentials>,
    refresh_interval: usize,
    chunk_count: usize,
) -> Dispatcher {
    dispatcher_with(
        root,
        Arc::new(signer(server)),
        credentials,
        refresh_interval,
        chunk_count,
    )
    .await
}

async fn dispatcher_with(
    root: &Path,
    storage: Arc<dyn ObjectStorage>,
    credentials: Arc<FixedCredentials>,
    refresh_interval: usize,
    chunk_count: usize,
) -> Dispatcher {
    let index = Arc::new(LocalIndex::scan(root, &TracingReporter).await.unwrap());
    let downloader = Arc::new(Downloader::new(Client::new(), storage, index, "image/"));
    let manager = Arc::new(CredentialManager::new(credentials, refresh_interval));
    manager.initialize(&TracingReporter).await;
    Dispatcher::new(downloader, manager, Arc::new(TracingReporter), chunk_count)
}

#[tokio::test]
async fn failing_chunk_does_not_affect_siblings() {
    let server = MockServer::start().await;
    mount_images(&server).await;
    mount_denied(&server).await;
    let tmp = TempDir::new().unwrap();
    let credentials = Arc::new(FixedCredentials::default());
    let dispatcher = dispatcher(tmp.path(), &server, credentials, 0, 3).await;

    // Three chunks of three; every item of the middle chunk is denied.
    let items: Vec<CatalogItem> = (0..9)
        .map(|i| {
            let prefix = if (3..6).contains(&i) { "broken" } else { "compressed" };
            item(i, "tom", &format!("{prefix}/{i}.jpg"))
        })
        .collect();

    dispatcher.run(items, 1, 9).await;

    let stats = dispatcher.stats();
    assert_eq!(stats.downloaded(), 6);
    assert_eq!(stats.failed(), 3);
    assert_eq!(stats.chunks_aborted(), 0);
    assert_eq!(
        files_in(&tmp.path().join("tom")),
        vec!["0.jpg", "1.jpg", "2.jpg", "6.jpg", "7.jpg", "8.jpg"]
    );
}

#[tokio::test]
async fn credential_refreshes_between_pages_after_interval() {
    let server = MockServer::start().await;
    mount_images(&server).await;
    let tmp = TempDir::new().unwrap();
    let credentials = Arc::new(FixedCredentials::default());
    let dispatcher = dispatcher(tmp.path(), &server, credentials.clone(), 5, 2).await;
    assert_eq!(credentials.calls(), 1);

    let page = |base: usize| -> Vec<CatalogItem> {
        (base..base + 4)
            .map(|i| item(i, "tom", &format!("compressed/{i}.jpg")))
            .collect()
    };

    dispatcher.run(page(0), 1, 12).await;
    assert_eq!(credentials.calls(), 1, "4 items is below the interval");

    dispatcher.run(page(4), 5, 12).await;
    assert_eq!(credentials.calls(), 1, "refresh is checked before dispatch");

    dispatcher.run(page(8), 9, 12).await;
    assert_eq!(credentials.calls(), 2);
    assert_eq!(dispatcher.stats().downloaded(), 12);
}

#[tokio::test]
async fn panicking_chunk_is_aborted_and_siblings_finish() {
    let server = MockServer::start().await;
    mount_images(&server).await;
    let tmp = TempDir::new().unwrap();
    let storage = Arc::new(PanicOnKey {
        signer: signer(&server),
        key: "compressed/4.jpg",
    });
    let credentials = Arc::new(FixedCredentials::default());
    let dispatcher = dispatcher_with(tmp.path(), storage, credentials, 0, 3).await;

    let items: Vec<CatalogItem> = (0..9)
        .map(|i| item(i, "tom", &format!("compressed/{i}.jpg")))
        .collect();

    dispatcher.run(items, 1, 9).await;

    // The middle chunk got through item 3 before panicking on item 4.
    let stats = dispatcher.stats();
    assert_eq!(stats.chunks_aborted(), 1);
    assert_eq!(stats.downloaded(), 7);
    assert_eq!(stats.failed(), 0);
    assert_eq!(
        files_in(&tmp.path().join("tom")),
        vec!["0.jpg", "1.jpg", "2.jpg", "3.jpg", "6.jpg", "7.jpg", "8.jpg"]
    );
}

#[tokio::test]
async fn credential_cadence_counts_from_run_start() {
    let server = MockServer::start().await;
    mount_images(&server).await;
    let tmp = TempDir::new().unwrap();
    let credentials = Arc::new(FixedCredentials::default());
    // Interval 3 with pages of 2: multiples 3, 6 and 9 are crossed before
    // the checks at 4, 6 and 10.
    let dispatcher = dispatcher(tmp.path(), &server, credentials.clone(), 3, 2).await;

    let mut calls = Vec::new();
    for page in 0..6 {
        let items: Vec<CatalogItem> = (page * 2..page * 2 + 2)
            .map(|i| item(i, "tom", &format!("compressed/{i}.jpg")))
            .collect();
        dispatcher.run(items, page * 2 + 1, 12).await;
        calls.push(credentials.calls());
    }

    assert_eq!(calls, vec![1, 1, 2, 3, 3, 4]);
    assert_eq!(dispatcher.stats().downloaded(), 12);
}
