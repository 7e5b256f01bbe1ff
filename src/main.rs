use anyhow::{Context, Result};
use chrono::Duration;
use reqwest::Client;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use photo_mirror::{
    config::AppConfig,
    services::{
        catalog_service::HttpCatalog,
        credential_service::HttpCredentialSource,
        object_storage::CosSigner,
        reporter::TracingReporter,
        sync_service::SyncService,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;
    tracing::info!("Starting photo-mirror with config: {:?}", cfg);

    // --- Collaborators ---
    let client = Client::builder()
        .timeout(cfg.http_timeout)
        .build()
        .context("building http client")?;

    let catalog = HttpCatalog::new(client.clone(), &cfg.catalog_url)?;
    let credentials = HttpCredentialSource::new(client.clone(), cfg.credential_url.clone());

    let sign_ttl = Duration::from_std(cfg.sign_ttl).context("sign ttl out of range")?;
    let mut signer = CosSigner::new(sign_ttl);
    if let Some(endpoint) = &cfg.storage_endpoint {
        signer = signer.with_endpoint(endpoint)?;
    }

    let service = SyncService::new(
        Arc::new(catalog),
        Arc::new(credentials),
        Arc::new(signer),
        client,
        Arc::new(TracingReporter),
        cfg.sync_options(),
    );

    // --- Run ---
    let summary = service.run().await?;
    if summary.failed > 0 || summary.pages_failed > 0 || summary.delete_failures > 0 {
        tracing::warn!(
            "Completed with {} failed downloads, {} failed pages, {} failed deletions",
            summary.failed,
            summary.pages_failed,
            summary.delete_failures
        );
    }

    Ok(())
}
