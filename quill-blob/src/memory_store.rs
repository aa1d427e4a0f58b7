use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::{
    BlobError, BlobResult, BlobStore, ObjectHead, PutResult, SignedTarget, SignedUrlBlobStore,
};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    etag: String,
    last_modified: i64,
}

#[derive(Debug, Clone)]
struct WriteGrant {
    key: String,
    content_type: Option<String>,
    expires_at: DateTime<Utc>,
}

/// In-memory store with signed write targets, for tests and the dev server.
///
/// Signed URLs look like `{base_url}/{key}?token={token}`. A write is accepted
/// only with a live token issued for that exact key and content type.
#[derive(Clone)]
pub struct MemoryBlobStore {
    base_url: String,
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    grants: Arc<RwLock<HashMap<String, WriteGrant>>>,
    fail_deletes: Arc<AtomicBool>,
}

impl MemoryBlobStore {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Arc::new(RwLock::new(HashMap::new())),
            grants: Arc::new(RwLock::new(HashMap::new())),
            fail_deletes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Write through a signed URL previously returned by `sign_put`.
    pub fn write_signed(
        &self,
        url: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> BlobResult<PutResult> {
        let rest = url
            .strip_prefix(&self.base_url)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| BlobError::signature_invalid("URL was not issued by this store"))?;
        let (key, query) = rest
            .split_once('?')
            .ok_or_else(|| BlobError::signature_invalid("missing token"))?;
        let token = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))
            .ok_or_else(|| BlobError::signature_invalid("missing token"))?;

        self.write_with_token(key, token, content_type, body)
    }

    /// Write to `key` presenting `token`; the transport-level half of a signed PUT.
    pub fn write_with_token(
        &self,
        key: &str,
        token: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> BlobResult<PutResult> {
        let grant = self
            .grants
            .read()
            .get(token)
            .cloned()
            .ok_or_else(|| BlobError::signature_invalid("unknown token"))?;

        if grant.key != key {
            return Err(BlobError::signature_invalid("token was issued for another key"));
        }
        if grant.expires_at <= Utc::now() {
            return Err(BlobError::SignatureExpired);
        }
        if grant.content_type.is_some() && grant.content_type.as_deref() != content_type {
            return Err(BlobError::signature_invalid("content type does not match"));
        }

        debug!(key, size = body.len(), "signed write accepted");
        Ok(self.store_object(key, content_type, body))
    }

    /// Whether an object exists at `key` (test helper)
    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    /// Number of stored objects (test helper)
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// Make every `delete` fail with a backend error (test helper)
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Number of write grants still held, live or not yet pruned (test helper)
    pub fn grant_count(&self) -> usize {
        self.grants.read().len()
    }

    /// Expire every outstanding write grant (test helper)
    pub fn expire_grants(&self) {
        let past = Utc::now() - Duration::seconds(1);
        for grant in self.grants.write().values_mut() {
            grant.expires_at = past;
        }
    }

    fn store_object(&self, key: &str, content_type: Option<&str>, data: Bytes) -> PutResult {
        let etag = format!("\"{}\"", Uuid::new_v4().simple());
        let size_bytes = data.len() as u64;
        let object = StoredObject {
            data,
            content_type: content_type.map(str::to_string),
            etag: etag.clone(),
            last_modified: Utc::now().timestamp(),
        };
        self.objects.write().insert(key.to_string(), object);

        PutResult {
            etag: Some(etag),
            size_bytes,
        }
    }

    fn new_token() -> String {
        URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        let objects = self.objects.read();
        let object = objects.get(key).ok_or_else(|| BlobError::not_found(key))?;
        Ok(ObjectHead {
            size_bytes: object.data.len() as u64,
            content_type: object.content_type.clone(),
            etag: Some(object.etag.clone()),
            last_modified: Some(object.last_modified),
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::backend(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("delete of {} refused", key),
            )));
        }
        if self.objects.write().remove(key).is_some() {
            debug!(key, "object deleted");
        }
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl SignedUrlBlobStore for MemoryBlobStore {
    async fn sign_put(
        &self,
        key: &str,
        content_type: Option<&str>,
        expires_in_secs: u64,
    ) -> BlobResult<SignedTarget> {
        let now = Utc::now();
        let expires_at = SignedTarget::expiry_after(now, expires_in_secs)?;
        let token = Self::new_token();

        let mut grants = self.grants.write();
        grants.retain(|_, grant| grant.expires_at > now);
        grants.insert(
            token.clone(),
            WriteGrant {
                key: key.to_string(),
                content_type: content_type.map(str::to_string),
                expires_at,
            },
        );
        drop(grants);

        let url = format!("{}/{}?token={}", self.base_url, key, token);
        let mut target = SignedTarget::put(url, expires_at);
        if let Some(ct) = content_type {
            target = target.with_header("content-type", ct);
        }
        Ok(target)
    }
}
