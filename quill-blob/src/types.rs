use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{BlobError, BlobResult};

/// A short-lived, pre-signed write target.
///
/// The caller writes the raw bytes straight to `url` using `method` and the
/// listed `headers`; writing again before expiry overwrites the same object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTarget {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub expires_at: DateTime<Utc>,
}

impl SignedTarget {
    pub fn put(url: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            url,
            method: "PUT".to_string(),
            headers: Vec::new(),
            expires_at,
        }
    }

    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// `now + expires_in_secs`, or `Invalid` when that is not a representable instant.
    pub fn expiry_after(now: DateTime<Utc>, expires_in_secs: u64) -> BlobResult<DateTime<Utc>> {
        i64::try_from(expires_in_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| BlobError::invalid(format!("expiry of {}s is out of range", expires_in_secs)))
    }
}
