//! Short-lived storage credential and the issuing endpoint's payload.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

use crate::errors::CredentialError;

/// Temporary credential used to sign object URLs.
#[derive(Clone)]
pub struct Credential {
    pub secret_id: String,
    pub secret_key: String,
    pub session_token: String,

    /// Absolute expiry instant.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Already-expired credential with empty secrets.
    ///
    /// Used when no credential could be obtained: signing still succeeds, the
    /// storage backend rejects the request and the item fails on its own.
    pub fn placeholder() -> Self {
        Self {
            secret_id: String::new(),
            secret_key: String::new(),
            session_token: String::new(),
            expires_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("secret_id", &self.secret_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Response body of the credential-issuing endpoint.
#[derive(Deserialize, Debug)]
pub struct CredentialPayload {
    /// Unix seconds.
    #[serde(rename = "ExpiredTime")]
    pub expired_time: Option<i64>,

    #[serde(rename = "Expiration")]
    pub expiration: Option<String>,

    #[serde(rename = "Credentials")]
    pub credentials: Option<TempKeys>,

    #[serde(rename = "RequestId")]
    pub request_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct TempKeys {
    #[serde(rename = "Token")]
    pub token: String,

    #[serde(rename = "TmpSecretId")]
    pub tmp_secret_id: String,

    #[serde(rename = "TmpSecretKey")]
    pub tmp_secret_key: String,
}

impl TryFrom<CredentialPayload> for Credential {
    type Error = CredentialError;

    fn try_from(payload: CredentialPayload) -> Result<Self, Self::Error> {
        let keys = payload
            .credentials
            .ok_or_else(|| CredentialError::Malformed("missing Credentials".into()))?;

        // ExpiredTime is authoritative; Expiration is an RFC 3339 fallback.
        let expires_at = match (payload.expired_time, payload.expiration.as_deref()) {
            (Some(secs), _) => DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| CredentialError::Malformed(format!("bad ExpiredTime {secs}")))?,
            (None, Some(text)) => DateTime::parse_from_rfc3339(text)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| CredentialError::Malformed(format!("bad Expiration: {e}")))?,
            (None, None) => {
                return Err(CredentialError::Malformed("missing expiry".into()));
            }
        };

        Ok(Self {
            secret_id: keys.tmp_secret_id,
            secret_key: keys.tmp_secret_key,
            session_token: keys.token,
            expires_at,
        })
    }
}
