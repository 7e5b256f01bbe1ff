//! Splits object-storage URLs into region, bucket and key.
//!
//! Two URL shapes are in use:
//! - virtual-hosted: `https://{bucket}.cos.{region}.{domain}/{key}`
//! - path-style:     `https://cos.{region}.{domain}/{bucket}/{key}`

use crate::{errors::MalformedPathError, models::BucketLocation};

/// First host label of a path-style URL.
pub const SERVICE_MARKER: &str = "cos";

pub fn resolve(url: &str) -> Result<BucketLocation, MalformedPathError> {
    let stripped = strip_scheme(url);
    let (host, rest) = stripped
        .split_once('/')
        .ok_or_else(|| MalformedPathError::new(url, "no path after host"))?;

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 3 {
        return Err(MalformedPathError::new(url, "too few host labels"));
    }

    let (region, bucket, key) = if labels[0] != SERVICE_MARKER {
        (labels[2], labels[0], rest)
    } else {
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| MalformedPathError::new(url, "no key after bucket"))?;
        (labels[1], bucket, key)
    };

    if region.is_empty() || bucket.is_empty() || key.is_empty() {
        return Err(MalformedPathError::new(url, "empty region, bucket or key"));
    }

    Ok(BucketLocation {
        region: region.to_string(),
        bucket: bucket.to_string(),
        key: key.to_string(),
    })
}

fn strip_scheme(url: &str) -> &str {
    for scheme in ["https://", "http://"] {
        match url.get(..scheme.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(scheme) => return &url[scheme.len()..],
            _ => {}
        }
    }
    url
}
