use async_trait::async_trait;
use crate::{BlobResult, SignedTarget};

/// Core blob storage operations - must be implemented by all storage backends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Get blob metadata without content. Missing objects are `BlobError::NotFound`.
    async fn head(&self, key: &str) -> BlobResult<ObjectHead>;

    /// Delete a blob. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// Stable read URL for a stored object
    fn object_url(&self, key: &str) -> String;
}

/// Signed URL support
#[async_trait]
pub trait SignedUrlBlobStore: BlobStore {
    /// Generate a signed URL for writing
    async fn sign_put(
        &self,
        key: &str,
        content_type: Option<&str>,
        expires_in_secs: u64,
    ) -> BlobResult<SignedTarget>;
}

/// Result of a successful signed write
#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size_bytes: u64,
}

/// Metadata about a blob
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<i64>,
}

/// Strategy for generating blob keys
pub trait BlobKeyStrategy: Send + Sync {
    /// Key of the object written through one upload session.
    ///
    /// Must be deterministic for a given session so repeated writes overwrite.
    fn upload_key(&self, group_id: &str, draft_id: &str, upload_id: &str, filename: &str) -> String;
}

/// Default key strategy: drafts/group/draft/upload_id.ext
#[derive(Debug, Clone)]
pub struct DefaultKeyStrategy;

impl DefaultKeyStrategy {
    fn extension(filename: &str) -> Option<String> {
        let (_, ext) = filename.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(ext)
    }

    fn segment(raw: &str) -> String {
        raw.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }
}

impl BlobKeyStrategy for DefaultKeyStrategy {
    fn upload_key(&self, group_id: &str, draft_id: &str, upload_id: &str, filename: &str) -> String {
        let base = format!(
            "drafts/{}/{}/{}",
            Self::segment(group_id),
            Self::segment(draft_id),
            Self::segment(upload_id)
        );
        match Self::extension(filename) {
            Some(ext) => format!("{}.{}", base, ext),
            None => base,
        }
    }
}
