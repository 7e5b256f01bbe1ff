//! Represents where an object lives in the storage backend.

/// Region, bucket and key derived from an object URL. Never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketLocation {
    /// Region the bucket is hosted in (e.g. "ap-guangzhou").
    pub region: String,

    pub bucket: String,

    /// Object key within the bucket, without a leading `/`.
    pub key: String,
}

impl BucketLocation {
    /// `https://{bucket}.{service}.{region}.{domain}/{key}`
    pub fn virtual_hosted_url(&self, service: &str, domain: &str) -> String {
        format!(
            "https://{}.{}.{}.{}/{}",
            self.bucket, service, self.region, domain, self.key
        )
    }

    /// `https://{service}.{region}.{domain}/{bucket}/{key}`
    pub fn path_style_url(&self, service: &str, domain: &str) -> String {
        format!(
            "https://{}.{}.{}/{}/{}",
            service, self.region, domain, self.bucket, self.key
        )
    }
}
