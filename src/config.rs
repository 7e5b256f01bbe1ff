use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::services::{
    dispatcher::DEFAULT_CHUNK_COUNT,
    downloader::DEFAULT_CONTENT_PREFIX,
    sync_service::{DEFAULT_PAGE_SIZE, DEFAULT_REFRESH_INTERVAL, SyncOptions},
};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mirror_root: PathBuf,
    pub catalog_url: String,
    pub credential_url: String,
    pub storage_endpoint: Option<String>,
    pub page_size: usize,
    pub chunk_count: usize,
    pub refresh_interval: usize,
    pub sign_ttl: Duration,
    pub http_timeout: Duration,
    pub content_prefix: String,
    pub marker_path: Option<PathBuf>,
    pub sweep_on_partial: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Mirror the photo catalog into a local directory tree")]
pub struct Args {
    /// Local mirror directory (overrides PHOTO_SYNC_MIRROR_ROOT)
    #[arg(long)]
    pub mirror_root: Option<PathBuf>,

    /// Base URL of the cloud service (overrides PHOTO_SYNC_SERVICE_URL)
    #[arg(long)]
    pub service_url: Option<String>,

    /// Catalog endpoint, defaults to {service_url}/photo (overrides PHOTO_SYNC_CATALOG_URL)
    #[arg(long)]
    pub catalog_url: Option<String>,

    /// Credential endpoint, defaults to {service_url}/getTempCOS (overrides PHOTO_SYNC_CREDENTIAL_URL)
    #[arg(long)]
    pub credential_url: Option<String>,

    /// Path-style storage endpoint for compatible gateways (overrides PHOTO_SYNC_STORAGE_ENDPOINT)
    #[arg(long)]
    pub storage_endpoint: Option<String>,

    /// Catalog records per page (overrides PHOTO_SYNC_PAGE_SIZE)
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Concurrent download chunks per page (overrides PHOTO_SYNC_CHUNKS)
    #[arg(long = "chunks")]
    pub chunk_count: Option<usize>,

    /// Refresh the credential after this many items, 0 to disable (overrides PHOTO_SYNC_REFRESH_EVERY)
    #[arg(long = "refresh-every")]
    pub refresh_interval: Option<usize>,

    /// Signed URL lifetime in seconds (overrides PHOTO_SYNC_SIGN_TTL)
    #[arg(long = "sign-ttl")]
    pub sign_ttl_secs: Option<u64>,

    /// Per-request HTTP timeout in seconds (overrides PHOTO_SYNC_HTTP_TIMEOUT)
    #[arg(long = "http-timeout")]
    pub http_timeout_secs: Option<u64>,

    /// Accepted content type prefix (overrides PHOTO_SYNC_CONTENT_PREFIX)
    #[arg(long)]
    pub content_prefix: Option<String>,

    /// Marker file written after a complete run (overrides PHOTO_SYNC_MARKER)
    #[arg(long = "marker")]
    pub marker_path: Option<PathBuf>,

    /// Delete orphans even when some catalog pages failed to load
    #[arg(long)]
    pub sweep_on_partial: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_args(Args::parse(), |key: &str| env::var(key))
    }

    /// Merge `args` over values looked up through `var`.
    pub fn from_args<F>(args: Args, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_string = |key: &str| -> Result<Option<String>> {
            match var(key) {
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(err) => Err(err).with_context(|| format!("reading {}", key)),
            }
        };
        let service_url = args
            .service_url
            .or(env_string("PHOTO_SYNC_SERVICE_URL")?)
            .map(|url| url.trim_end_matches('/').to_string());
        let derived = |suffix: &str| service_url.as_ref().map(|s| format!("{s}/{suffix}"));

        let catalog_url = match args
            .catalog_url
            .or(env_string("PHOTO_SYNC_CATALOG_URL")?)
            .or_else(|| derived("photo"))
        {
            Some(url) => url,
            None => bail!("either --service-url or --catalog-url must be set"),
        };
        let credential_url = match args
            .credential_url
            .or(env_string("PHOTO_SYNC_CREDENTIAL_URL")?)
            .or_else(|| derived("getTempCOS"))
        {
            Some(url) => url,
            None => bail!("either --service-url or --credential-url must be set"),
        };

        let page_size = pick(
            args.page_size,
            env_string("PHOTO_SYNC_PAGE_SIZE")?,
            "PHOTO_SYNC_PAGE_SIZE",
            DEFAULT_PAGE_SIZE,
        )?;
        let chunk_count = pick(
            args.chunk_count,
            env_string("PHOTO_SYNC_CHUNKS")?,
            "PHOTO_SYNC_CHUNKS",
            DEFAULT_CHUNK_COUNT,
        )?;
        if page_size == 0 || chunk_count == 0 {
            bail!("page size and chunk count must be at least 1");
        }

        let refresh_interval = pick(
            args.refresh_interval,
            env_string("PHOTO_SYNC_REFRESH_EVERY")?,
            "PHOTO_SYNC_REFRESH_EVERY",
            DEFAULT_REFRESH_INTERVAL,
        )?;
        let sign_ttl_secs = pick(
            args.sign_ttl_secs,
            env_string("PHOTO_SYNC_SIGN_TTL")?,
            "PHOTO_SYNC_SIGN_TTL",
            900,
        )?;
        let http_timeout_secs = pick(
            args.http_timeout_secs,
            env_string("PHOTO_SYNC_HTTP_TIMEOUT")?,
            "PHOTO_SYNC_HTTP_TIMEOUT",
            60,
        )?;

        // --- Merge ---
        Ok(Self {
            mirror_root: args
                .mirror_root
                .or(env_string("PHOTO_SYNC_MIRROR_ROOT")?.map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("./photos")),
            catalog_url,
            credential_url,
            storage_endpoint: args
                .storage_endpoint
                .or(env_string("PHOTO_SYNC_STORAGE_ENDPOINT")?),
            page_size,
            chunk_count,
            refresh_interval,
            sign_ttl: Duration::from_secs(sign_ttl_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
            content_prefix: args
                .content_prefix
                .or(env_string("PHOTO_SYNC_CONTENT_PREFIX")?)
                .unwrap_or_else(|| DEFAULT_CONTENT_PREFIX.into()),
            marker_path: Some(
                args.marker_path
                    .or(env_string("PHOTO_SYNC_MARKER")?.map(PathBuf::from))
                    .unwrap_or_else(|| PathBuf::from("./photos.synced")),
            ),
            sweep_on_partial: args.sweep_on_partial,
        })
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            mirror_root: self.mirror_root.clone(),
            page_size: self.page_size,
            chunk_count: self.chunk_count,
            refresh_interval: self.refresh_interval,
            content_prefix: self.content_prefix.clone(),
            sweep_on_partial: self.sweep_on_partial,
            marker_path: self.marker_path.clone(),
        }
    }
}

/// Flag value, else parsed environment value, else `default`.
fn pick<T>(flag: Option<T>, env_value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(value) = flag {
        return Ok(value);
    }
    match env_value {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        None => Ok(default),
    }
}
