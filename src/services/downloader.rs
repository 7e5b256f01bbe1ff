//! Fetches one catalog item into the mirror.
//!
//! Bodies are streamed into a temp file next to the destination and renamed
//! into place only after the content type and checksum have been accepted, so
//! the final path never holds a partial download.

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use reqwest::{
    Client,
    header::{CONTENT_TYPE, ETAG},
};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    errors::DownloadError,
    models::{
        BucketLocation, CatalogItem, Credential, DownloadFailure, FailureKind, Outcome,
        SkipReason,
    },
    services::{local_index::LocalIndex, object_storage::ObjectStorage, path_resolver},
};

const MAX_SEGMENT_LEN: usize = 255;

pub const DEFAULT_CONTENT_PREFIX: &str = "image/";

pub struct Downloader {
    client: Client,
    storage: Arc<dyn ObjectStorage>,
    index: Arc<LocalIndex>,
    content_prefix: String,
}

impl Downloader {
    pub fn new(
        client: Client,
        storage: Arc<dyn ObjectStorage>,
        index: Arc<LocalIndex>,
        content_prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            storage,
            index,
            content_prefix: content_prefix.into(),
        }
    }

    pub async fn fetch(&self, item: &CatalogItem, credential: &Credential) -> Outcome {
        if item.object_path.is_empty() {
            return Outcome::Skipped(SkipReason::NoPath);
        }

        let location = match path_resolver::resolve(&item.object_path) {
            Ok(location) => location,
            Err(err) => {
                debug!("{err}");
                return Outcome::Skipped(SkipReason::MalformedPath);
            }
        };

        let file_name = item.file_name();
        if !is_safe_segment(file_name) {
            return Outcome::Skipped(SkipReason::MalformedPath);
        }
        if !is_safe_segment(&item.group_id) {
            return Outcome::Skipped(SkipReason::InvalidGroup);
        }

        let local_dir = self.index.root().join(&item.group_id);
        if let Err(err) = fs::create_dir_all(&local_dir).await {
            return Outcome::Skipped(SkipReason::DirError(err.to_string()));
        }

        let local_path = local_dir.join(file_name);
        if fs::try_exists(&local_path).await.unwrap_or(false) {
            self.index.confirm(file_name);
            return Outcome::AlreadyPresent;
        }

        match self
            .download(&location, credential, &local_dir, &local_path)
            .await
        {
            Ok(()) => {
                self.index.confirm(file_name);
                Outcome::Downloaded
            }
            Err(err) => Outcome::Failed(failure_from(err)),
        }
    }

    async fn download(
        &self,
        location: &BucketLocation,
        credential: &Credential,
        dir: &Path,
        dest: &Path,
    ) -> Result<(), DownloadError> {
        let url = self.storage.signed_url(location, credential)?;
        let response = self.client.get(url).send().await?;

        // Rejected signatures come back as XML error documents.
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !has_content_prefix(content_type, &self.content_prefix) {
            return Err(DownloadError::ContentType(content_type.to_string()));
        }
        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status().as_u16()));
        }

        let expected_md5 = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_ascii_lowercase())
            .filter(|v| is_plain_md5(v));

        let stream = response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other));
        let (tmp_path, digest) = stream_to_temp(dir, stream).await?;

        if let Some(expected) = expected_md5 {
            if expected != digest {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(DownloadError::Checksum {
                    expected,
                    actual: digest,
                });
            }
        }

        move_into_place(&tmp_path, dest).await?;

        debug!("wrote {} (md5 {digest})", dest.display());
        Ok(())
    }
}

/// Write `stream` into a new `.tmp-*` file under `dir`, returning its path and
/// the hex MD5 of the bytes written. The temp file is removed on error.
pub async fn stream_to_temp<S>(dir: &Path, stream: S) -> io::Result<(PathBuf, String)>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let tmp_path = dir.join(format!(".tmp-{}", Uuid::new_v4()));
    let mut file = File::create(&tmp_path).await?;

    let mut digest = Context::new();
    pin_mut!(stream);
    while let Some(chunk_res) = stream.next().await {
        let chunk = match chunk_res {
            Ok(chunk) => chunk,
            Err(err) => {
                drop(file);
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        };
        digest.consume(&chunk);
        if let Err(err) = file.write_all(&chunk).await {
            drop(file);
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
    }
    if let Err(err) = file.flush().await {
        drop(file);
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err);
    }
    if let Err(err) = file.sync_all().await {
        drop(file);
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err);
    }

    Ok((tmp_path, format!("{:x}", digest.compute())))
}

/// Rename `tmp_path` onto `dest`, replacing an existing file on platforms
/// where rename does not. The temp file is removed on error.
async fn move_into_place(tmp_path: &Path, dest: &Path) -> io::Result<()> {
    let moved = match fs::rename(tmp_path, dest).await {
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            match fs::remove_file(dest).await {
                Ok(()) => fs::rename(tmp_path, dest).await,
                Err(err) => Err(err),
            }
        }
        other => other,
    };
    if moved.is_err() {
        let _ = fs::remove_file(tmp_path).await;
    }
    moved
}

/// Media types compare case-insensitively.
fn has_content_prefix(content_type: &str, prefix: &str) -> bool {
    content_type
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn failure_from(err: DownloadError) -> DownloadFailure {
    let kind = match &err {
        DownloadError::ContentType(_) => FailureKind::Unauthorized,
        DownloadError::Checksum { .. } => FailureKind::Checksum,
        _ => FailureKind::Transport,
    };
    DownloadFailure::new(kind, err.to_string())
}

/// A name usable as exactly one path component under the mirror root.
fn is_safe_segment(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_SEGMENT_LEN {
        return false;
    }
    if name == "." || name == ".." {
        return false;
    }
    !name
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'/' || b == b'\\' || b == b'\0')
}

/// Multipart uploads get `<md5>-<parts>` ETags, which are not body digests.
fn is_plain_md5(etag: &str) -> bool {
    etag.len() == 32 && etag.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tempfile::TempDir;

    #[test]
    fn segment_safety() {
        assert!(is_safe_segment("cat1.jpg"));
        assert!(is_safe_segment("猫猫"));
        assert!(!is_safe_segment(""));
        assert!(!is_safe_segment(".."));
        assert!(!is_safe_segment("a\\b"));
        assert!(!is_safe_segment("a\nb"));
        assert!(!is_safe_segment(&"x".repeat(300)));
    }

    #[test]
    fn md5_etag_detection() {
        assert!(is_plain_md5("d41d8cd98f00b204e9800998ecf8427e"));
        assert!(!is_plain_md5("d41d8cd98f00b204e9800998ecf8427e-3"));
        assert!(!is_plain_md5("abc"));
    }

    #[test]
    fn content_prefix_ignores_case() {
        assert!(has_content_prefix("image/jpeg", "image/"));
        assert!(has_content_prefix("Image/JPEG", "image/"));
        assert!(has_content_prefix("IMAGE/png; charset=binary", "image/"));
        assert!(!has_content_prefix("application/xml", "image/"));
        assert!(!has_content_prefix("ima", "image/"));
        assert!(!has_content_prefix("", "image/"));
    }

    #[tokio::test]
    async fn failed_move_removes_temp_file() {
        let tmp = TempDir::new().unwrap();
        let (path, _) = stream_to_temp(tmp.path(), stream::iter(vec![Ok(Bytes::from_static(b"x"))]))
            .await
            .unwrap();
        // A non-empty directory in the way cannot be replaced by a file.
        let dest = tmp.path().join("cat1.jpg");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("inner"), b"y").unwrap();

        assert!(move_into_place(&path, &dest).await.is_err());
        assert!(!path.exists());
        assert!(dest.join("inner").exists());
    }

    #[tokio::test]
    async fn move_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        let (path, _) = stream_to_temp(tmp.path(), stream::iter(vec![Ok(Bytes::from_static(b"new"))]))
            .await
            .unwrap();
        let dest = tmp.path().join("cat1.jpg");
        std::fs::write(&dest, b"old").unwrap();

        move_into_place(&path, &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn temp_file_holds_stream_and_digest() {
        let tmp = TempDir::new().unwrap();
        let chunks = vec![Ok(Bytes::from_static(b"hello ")), Ok(Bytes::from_static(b"world"))];
        let (path, digest) = stream_to_temp(tmp.path(), stream::iter(chunks)).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
        assert_eq!(digest, format!("{:x}", md5::compute(b"hello world")));
    }

    #[tokio::test]
    async fn temp_file_removed_on_stream_error() {
        let tmp = TempDir::new().unwrap();
        let chunks = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(ErrorKind::ConnectionReset, "reset")),
        ];
        let err = stream_to_temp(tmp.path(), stream::iter(chunks)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionReset);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
