#![allow(dead_code)]

use bytes::Bytes;
use quill_blob::MemoryBlobStore;
use quill_core::{GroupScope, UserId};
use quill_drafts::{
    DraftId, DraftsAdapter, DraftsConfig, FinalizedUpload, MemoryDraftBackend, UploadRequest,
    UploadTicket,
};

pub struct Harness {
    pub backend: MemoryDraftBackend,
    pub blobs: MemoryBlobStore,
    pub app: DraftsAdapter,
}

pub fn harness() -> Harness {
    harness_with(DraftsConfig::default())
}

pub fn harness_with(config: DraftsConfig) -> Harness {
    let backend = MemoryDraftBackend::new();
    let blobs = MemoryBlobStore::new("http://blobs.test");
    let app = DraftsAdapter::new(backend.clone(), blobs.clone(), config);
    Harness {
        backend,
        blobs,
        app,
    }
}

pub fn scope(user: &str, group: &str) -> GroupScope {
    GroupScope::new(user, group)
}

impl Harness {
    pub async fn new_draft(&self, scope: &GroupScope) -> DraftId {
        self.app.drafts.create_or_get(scope).await.unwrap().draft.id
    }

    pub async fn initiate(
        &self,
        owner: &UserId,
        draft_id: &DraftId,
        filename: &str,
        mime_type: &str,
    ) -> UploadTicket {
        self.app
            .uploads
            .initiate(owner, UploadRequest::new(draft_id.clone(), filename, mime_type, 4))
            .await
            .unwrap()
    }

    /// Write bytes through the ticket's signed target
    pub fn transfer(&self, ticket: &UploadTicket, mime_type: &str, body: &'static [u8]) {
        self.blobs
            .write_signed(&ticket.upload_url, Some(mime_type), Bytes::from_static(body))
            .unwrap();
    }

    /// Initiate, transfer and finalize one file
    pub async fn attach(
        &self,
        owner: &UserId,
        draft_id: &DraftId,
        filename: &str,
        mime_type: &str,
    ) -> FinalizedUpload {
        let ticket = self.initiate(owner, draft_id, filename, mime_type).await;
        self.transfer(&ticket, mime_type, b"data");
        self.app
            .uploads
            .finalize(owner, &ticket.upload_id)
            .await
            .unwrap()
    }
}
