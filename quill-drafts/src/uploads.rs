use std::sync::Arc;

use chrono::Utc;
use quill_blob::{BlobKeyStrategy, DefaultKeyStrategy, SignedUrlBlobStore};
use quill_core::UserId;
use tracing::{info, instrument, warn};

use crate::backend::VerifiedObject;
use crate::ledger::delete_blob_best_effort;
use crate::{
    DraftBackend, DraftError, DraftResult, DraftsConfig, FinalizedUpload, MediaId, SessionStatus,
    UploadId, UploadRequest, UploadSession, UploadTicket,
};

/// Three-phase upload protocol: initiate, direct transfer, finalize.
///
/// The coordinator hands out signed write targets and verifies objects
/// afterwards; file bytes never pass through it.
#[derive(Clone)]
pub struct UploadCoordinator {
    backend: Arc<dyn DraftBackend>,
    blobs: Arc<dyn SignedUrlBlobStore>,
    keys: Arc<dyn BlobKeyStrategy>,
    config: Arc<DraftsConfig>,
}

impl UploadCoordinator {
    pub fn new(
        backend: Arc<dyn DraftBackend>,
        blobs: Arc<dyn SignedUrlBlobStore>,
        config: Arc<DraftsConfig>,
    ) -> Self {
        Self {
            backend,
            blobs,
            keys: Arc::new(DefaultKeyStrategy),
            config,
        }
    }

    pub fn with_key_strategy<K: BlobKeyStrategy + 'static>(mut self, keys: K) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    /// Reserve a ledger slot and return a signed write target for it.
    ///
    /// Type and size are checked before anything is written.
    #[instrument(
        skip(self, caller, request),
        fields(draft_id = %request.draft_id, mime_type = %request.mime_type, size = request.declared_size)
    )]
    pub async fn initiate(&self, caller: &UserId, request: UploadRequest) -> DraftResult<UploadTicket> {
        self.validate(&request)?;

        let view = self
            .backend
            .get_draft(&request.draft_id)
            .await?
            .ok_or_else(|| DraftError::DraftNotFound(request.draft_id.to_string()))?;
        if &view.draft.owner != caller {
            return Err(DraftError::NotOwned(request.draft_id.to_string()));
        }
        if !view.draft.status.is_editing() {
            return Err(DraftError::DraftNotEditable {
                draft_id: request.draft_id.to_string(),
                status: view.draft.status.name().to_string(),
            });
        }
        if request.replace.is_none() && view.media.len() >= self.config.max_media {
            return Err(DraftError::QuotaExceeded {
                max: self.config.max_media,
            });
        }

        let upload_id = UploadId::new();
        let media_id = request.replace.clone().unwrap_or_else(MediaId::new);
        let object_key = self.keys.upload_key(
            view.draft.group_id.as_str(),
            view.draft.id.as_str(),
            upload_id.as_str(),
            &request.filename,
        );

        let target = self
            .blobs
            .sign_put(
                &object_key,
                Some(&request.mime_type),
                self.config.url_ttl.as_secs(),
            )
            .await?;

        let session = UploadSession {
            id: upload_id.clone(),
            draft_id: view.draft.id.clone(),
            media_id,
            owner: caller.clone(),
            group_id: view.draft.group_id.clone(),
            filename: request.filename.clone(),
            mime_type: request.mime_type.clone(),
            declared_size: request.declared_size,
            object_key,
            target: target.clone(),
            created_at: Utc::now(),
            expires_at: target.expires_at,
            status: SessionStatus::Initiated,
        };

        let record = self
            .backend
            .open_upload(session, request.replace.is_some(), self.config.max_media)
            .await?;

        info!(
            upload_id = %upload_id,
            media_id = %record.id,
            order_index = record.order_index,
            "upload initiated"
        );

        Ok(UploadTicket {
            upload_id,
            media_id: record.id,
            order_index: record.order_index,
            upload_url: target.url,
            method: target.method,
            headers: target.headers,
            expires_at: target.expires_at,
        })
    }

    fn validate(&self, request: &UploadRequest) -> DraftResult<()> {
        if request.filename.trim().is_empty() {
            return Err(DraftError::invalid("filename is required"));
        }
        if !self.config.allows_type(&request.mime_type) {
            return Err(DraftError::UnsupportedType {
                mime_type: request.mime_type.clone(),
            });
        }
        if request.declared_size == 0 {
            return Err(DraftError::invalid("declared size must be positive"));
        }
        if request.declared_size > self.config.max_file_bytes {
            return Err(DraftError::FileTooLarge {
                size: request.declared_size,
                max: self.config.max_file_bytes,
            });
        }
        Ok(())
    }

    /// Verify the transferred object and mark its ledger slot uploaded.
    #[instrument(skip(self, caller), fields(upload_id = %upload_id))]
    pub async fn finalize(&self, caller: &UserId, upload_id: &UploadId) -> DraftResult<FinalizedUpload> {
        let session = self
            .backend
            .get_session(upload_id)
            .await?
            .filter(|s| &s.owner == caller)
            .ok_or_else(|| DraftError::SessionNotFound(upload_id.to_string()))?;

        match session.status {
            SessionStatus::Initiated => {}
            SessionStatus::Completed { .. } => {
                return Err(DraftError::SessionAlreadyFinalized(upload_id.to_string()))
            }
            SessionStatus::Expired { .. } => {
                return Err(DraftError::SessionExpired(upload_id.to_string()))
            }
        }
        if session.is_expired_at(Utc::now()) {
            return Err(self.expire(upload_id).await);
        }

        let head = match self.blobs.head(&session.object_key).await {
            Ok(head) => head,
            Err(err) if err.is_not_found() => {
                info!(object_key = %session.object_key, "object not yet transferred");
                return Err(DraftError::ObjectMissing(session.object_key));
            }
            Err(err) => return Err(err.into()),
        };

        if head.size_bytes > self.config.max_file_bytes {
            self.backend
                .fail_upload(upload_id, "object exceeds the size limit")
                .await?;
            delete_blob_best_effort(self.blobs.as_ref(), &session.object_key).await;
            return Err(DraftError::FileTooLarge {
                size: head.size_bytes,
                max: self.config.max_file_bytes,
            });
        }

        let url = self.blobs.object_url(&session.object_key);
        let verified = VerifiedObject {
            url: url.clone(),
            size_bytes: head.size_bytes,
        };
        let record = match self.backend.complete_upload(caller, upload_id, verified).await {
            Ok(record) => record,
            Err(DraftError::SessionExpired(_)) => return Err(self.expire(upload_id).await),
            Err(err) => return Err(err),
        };

        info!(media_id = %record.id, size = record.size_bytes, "upload finalized");
        Ok(FinalizedUpload {
            media_id: record.id,
            url,
            mime_type: record.mime_type,
            file_size: record.size_bytes,
        })
    }

    async fn expire(&self, upload_id: &UploadId) -> DraftError {
        warn!("finalize after expiry; media slot marked failed");
        if let Err(err) = self.backend.fail_upload(upload_id, "upload session expired").await {
            return err;
        }
        DraftError::SessionExpired(upload_id.to_string())
    }
}
