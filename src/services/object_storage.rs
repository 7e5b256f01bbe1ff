//! Signed, time-limited download URLs for objects in COS-style storage.
//!
//! The signature follows the COS query-string scheme: a key derived from the
//! secret key and validity window signs a SHA-1 digest of the canonical
//! request. Only GET requests without signed headers or parameters are
//! produced.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha1::{Digest, Sha1};

use crate::{
    errors::SignError,
    models::{BucketLocation, Credential},
    services::path_resolver::SERVICE_MARKER,
};

type HmacSha1 = Hmac<Sha1>;

pub const DEFAULT_DOMAIN: &str = "myqcloud.com";

/// Produces a URL that can be fetched without further authentication.
pub trait ObjectStorage: Send + Sync {
    fn signed_url(
        &self,
        location: &BucketLocation,
        credential: &Credential,
    ) -> Result<Url, SignError>;
}

#[derive(Clone, Debug)]
pub struct CosSigner {
    domain: String,
    /// Path-style base URL used instead of the virtual-hosted bucket host.
    endpoint: Option<Url>,
    ttl: Duration,
}

impl CosSigner {
    pub fn new(ttl: Duration) -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            endpoint: None,
            ttl,
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, SignError> {
        let url = Url::parse(endpoint).map_err(|e| SignError::Endpoint(e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(SignError::Endpoint(endpoint.to_string()));
        }
        self.endpoint = Some(url);
        Ok(self)
    }

    /// Sign as of `now`. Split out so tests get stable signatures.
    pub fn sign_at(
        &self,
        location: &BucketLocation,
        credential: &Credential,
        now: DateTime<Utc>,
    ) -> Result<Url, SignError> {
        let mut url = self.object_url(location)?;

        let start = now.timestamp();
        let end = now
            .checked_add_signed(self.ttl)
            .ok_or(SignError::Window)?
            .timestamp();
        let key_time = format!("{start};{end}");

        let sign_key = hmac_sha1_hex(credential.secret_key.as_bytes(), &key_time)?;
        let http_string = format!("get\n/{}\n\n\n", location.key);
        let string_to_sign = format!(
            "sha1\n{}\n{}\n",
            key_time,
            hex::encode(Sha1::digest(http_string.as_bytes()))
        );
        let signature = hmac_sha1_hex(sign_key.as_bytes(), &string_to_sign)?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q-sign-algorithm", "sha1")
                .append_pair("q-ak", &credential.secret_id)
                .append_pair("q-sign-time", &key_time)
                .append_pair("q-key-time", &key_time)
                .append_pair("q-header-list", "")
                .append_pair("q-url-param-list", "")
                .append_pair("q-signature", &signature);
            if !credential.session_token.is_empty() {
                query.append_pair("x-cos-security-token", &credential.session_token);
            }
        }

        Ok(url)
    }

    fn object_url(&self, location: &BucketLocation) -> Result<Url, SignError> {
        let (mut url, prefix) = match &self.endpoint {
            Some(endpoint) => (endpoint.clone(), Some(location.bucket.as_str())),
            None => {
                let host = format!(
                    "https://{}.{}.{}.{}/",
                    location.bucket, SERVICE_MARKER, location.region, self.domain
                );
                let url = Url::parse(&host).map_err(|e| SignError::Endpoint(e.to_string()))?;
                (url, None)
            }
        };

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| SignError::Endpoint(location.bucket.clone()))?;
            segments.pop_if_empty();
            if let Some(bucket) = prefix {
                segments.push(bucket);
            }
            segments.extend(location.key.split('/'));
        }

        Ok(url)
    }
}

impl ObjectStorage for CosSigner {
    fn signed_url(
        &self,
        location: &BucketLocation,
        credential: &Credential,
    ) -> Result<Url, SignError> {
        self.sign_at(location, credential, Utc::now())
    }
}

fn hmac_sha1_hex(key: &[u8], message: &str) -> Result<String, SignError> {
    let mut mac = HmacSha1::new_from_slice(key).map_err(|_| SignError::Key)?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
