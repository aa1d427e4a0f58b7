use quill_blob::MemoryBlobStore;
use quill_drafts::{DraftsAdapter, DraftsConfig, MemoryDraftBackend};

/// Shared handler state.
///
/// `dev_blobs` is set only when the in-memory store backs uploads, in which
/// case the router also serves its signed write targets under `/blobs`.
#[derive(Clone)]
pub struct QuillState {
    pub drafts: DraftsAdapter,
    pub dev_blobs: Option<MemoryBlobStore>,
}

impl QuillState {
    pub fn new(drafts: DraftsAdapter) -> Self {
        Self {
            drafts,
            dev_blobs: None,
        }
    }

    /// Fully in-memory state; signed URLs point at `{public_base_url}/{key}`.
    pub fn in_memory<S: Into<String>>(config: DraftsConfig, public_base_url: S) -> Self {
        let blobs = MemoryBlobStore::new(public_base_url);
        let drafts = DraftsAdapter::new(MemoryDraftBackend::new(), blobs.clone(), config);
        Self {
            drafts,
            dev_blobs: Some(blobs),
        }
    }
}
