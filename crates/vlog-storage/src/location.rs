//! Object location parsing.
//!
//! Accepted forms:
//! - `s3://bucket/key` and `gs://bucket/key` (explicit bucket)
//! - `{public_base}/key` (public URL of the default bucket)
//! - a bare key in the default bucket

use url::Url;

use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    /// `None` means the client's default bucket
    pub bucket: Option<String>,
    pub key: String,
}

impl ObjectLocation {
    pub fn in_default_bucket(key: impl Into<String>) -> Self {
        Self {
            bucket: None,
            key: key.into(),
        }
    }

    /// Parse a location, stripping `public_base` from public URLs.
    pub fn parse(raw: &str, public_base: Option<&str>) -> StorageResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(StorageError::invalid_location("empty location"));
        }

        if let Some(base) = public_base.map(|b| b.trim_end_matches('/')).filter(|b| !b.is_empty()) {
            if let Some(key) = raw.strip_prefix(base).and_then(|rest| rest.strip_prefix('/')) {
                return Self::key_only(key, raw);
            }
        }

        if !raw.contains("://") {
            return Self::key_only(raw.trim_start_matches('/'), raw);
        }

        let url = Url::parse(raw).map_err(|e| StorageError::invalid_location(format!("{}: {}", raw, e)))?;
        match url.scheme() {
            "s3" | "gs" => {
                let bucket = url
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| StorageError::invalid_location(format!("{}: missing bucket", raw)))?;
                let key = url.path().trim_start_matches('/');
                if key.is_empty() {
                    return Err(StorageError::invalid_location(format!("{}: missing key", raw)));
                }
                Ok(Self {
                    bucket: Some(bucket.to_string()),
                    key: key.to_string(),
                })
            }
            other => Err(StorageError::invalid_location(format!(
                "{}: unsupported scheme {}",
                raw, other
            ))),
        }
    }

    fn key_only(key: &str, raw: &str) -> StorageResult<Self> {
        if key.is_empty() {
            return Err(StorageError::invalid_location(format!("{}: missing key", raw)));
        }
        Ok(Self::in_default_bucket(key))
    }

    pub fn bucket_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.bucket.as_deref().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gs_uri() {
        let loc = ObjectLocation::parse("gs://temp-bucket/temp/job-1/sample_0.mp4", None).unwrap();
        assert_eq!(loc.bucket.as_deref(), Some("temp-bucket"));
        assert_eq!(loc.key, "temp/job-1/sample_0.mp4");
    }

    #[test]
    fn test_parse_bare_key() {
        let loc = ObjectLocation::parse("users/u1/media/a.jpg", None).unwrap();
        assert_eq!(loc, ObjectLocation::in_default_bucket("users/u1/media/a.jpg"));
        assert_eq!(loc.bucket_or("media"), "media");
    }

    #[test]
    fn test_parse_public_url() {
        let loc = ObjectLocation::parse(
            "https://cdn.example.com/users/u1/vlogs/v1.mp4",
            Some("https://cdn.example.com/"),
        )
        .unwrap();
        assert_eq!(loc.key, "users/u1/vlogs/v1.mp4");
        assert!(loc.bucket.is_none());
    }

    #[test]
    fn test_rejects_bad_locations() {
        assert!(ObjectLocation::parse("", None).is_err());
        assert!(ObjectLocation::parse("gs://bucket-only", None).is_err());
        assert!(ObjectLocation::parse("ftp://host/key", None).is_err());
        assert!(ObjectLocation::parse("https://elsewhere.com/a.jpg", Some("https://cdn.example.com")).is_err());
    }
}
