pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_core::{GroupId, UserId};

use crate::{
    Draft, DraftId, DraftPatch, DraftResult, DraftView, MediaId, MediaRecord, Post, PostId,
    PublishedPost, UploadId, UploadSession,
};

pub use memory::{FaultPoint, MemoryDraftBackend};

/// Everything `delete_draft` removed, so the caller can clean up blobs
#[derive(Debug, Clone)]
pub struct RemovedDraft {
    pub draft: Draft,
    pub media: Vec<MediaRecord>,
    pub sessions: Vec<UploadSession>,
}

/// Object facts verified at finalize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedObject {
    pub url: String,
    pub size_bytes: u64,
}

/// Storage primitives for drafts, ledgers, upload sessions and posts.
///
/// Every mutating operation is a single conditional step keyed on the current
/// row state. Callers never read-then-write across two calls to enforce an
/// invariant; the backend checks ownership and status inside the operation.
#[async_trait]
pub trait DraftBackend: Send + Sync {
    /// Insert a new draft, failing with `ActiveDraftExists` when the
    /// (owner, group) pair already has an editing draft.
    async fn insert_draft(&self, draft: Draft) -> DraftResult<Draft>;

    /// The editing or publishing draft of (owner, group), if any
    async fn find_active_draft(&self, owner: &UserId, group: &GroupId) -> DraftResult<Option<DraftView>>;

    /// Draft plus its ordered ledger, unscoped
    async fn get_draft(&self, id: &DraftId) -> DraftResult<Option<DraftView>>;

    /// Drafts whose stored owner and group both match
    async fn list_drafts(&self, owner: &UserId, group: &GroupId) -> DraftResult<Vec<DraftView>>;

    /// Apply a patch to an editing draft owned by `owner`.
    ///
    /// A group change is refused with `WrongGroup` once the ledger is non-empty
    /// and moves the active-draft index otherwise.
    async fn update_draft(&self, owner: &UserId, id: &DraftId, patch: &DraftPatch) -> DraftResult<Draft>;

    /// Delete an editing draft with its ledger and upload sessions
    async fn delete_draft(&self, owner: &UserId, id: &DraftId) -> DraftResult<RemovedDraft>;

    /// Atomically allocate a ledger slot for `session` and store both.
    ///
    /// With `reuse_slot` the record `session.media_id` must already exist in a
    /// failed (or stale pending) state and keeps its `order_index`; otherwise a
    /// new record is appended at `len(ledger)`, bounded by `max_media`.
    async fn open_upload(
        &self,
        session: UploadSession,
        reuse_slot: bool,
        max_media: usize,
    ) -> DraftResult<MediaRecord>;

    async fn get_session(&self, id: &UploadId) -> DraftResult<Option<UploadSession>>;

    /// `Initiated -> Completed` for the session and `Pending -> Uploaded` for
    /// its record, as one step.
    async fn complete_upload(
        &self,
        owner: &UserId,
        id: &UploadId,
        object: VerifiedObject,
    ) -> DraftResult<MediaRecord>;

    /// `Initiated -> Expired` for the session and `Pending -> Failed` for its
    /// record. Returns the failed record when it was still bound to this session.
    async fn fail_upload(&self, id: &UploadId, reason: &str) -> DraftResult<Option<MediaRecord>>;

    /// Remove one record from an editing draft, compacting the ledger
    async fn remove_media(&self, owner: &UserId, draft_id: &DraftId, media_id: &MediaId) -> DraftResult<MediaRecord>;

    /// Rewrite every `order_index` to match `order`, or change nothing
    async fn reorder_media(&self, owner: &UserId, draft_id: &DraftId, order: &[MediaId]) -> DraftResult<Vec<MediaRecord>>;

    /// `Editing -> Publishing` after re-checking publishability under the lock
    async fn begin_publish(&self, owner: &UserId, id: &DraftId) -> DraftResult<DraftView>;

    /// `Publishing -> Editing`; `false` when the draft was not publishing
    async fn release_publish(&self, id: &DraftId) -> DraftResult<bool>;

    /// Insert `post` with one media row per ledger record and delete the
    /// draft, its ledger and sessions. Either all of it happens or none.
    async fn commit_publish(&self, id: &DraftId, post: Post) -> DraftResult<PublishedPost>;

    async fn get_post(&self, id: &PostId) -> DraftResult<Option<PublishedPost>>;

    /// Posts whose stored group matches, newest first
    async fn list_posts(&self, group: &GroupId) -> DraftResult<Vec<PublishedPost>>;

    /// Sessions still `Initiated` whose expiry is at or before `now`
    async fn expired_sessions(&self, now: DateTime<Utc>) -> DraftResult<Vec<UploadId>>;

    /// Drop finished sessions whose terminal transition happened before `cutoff`
    async fn purge_sessions(&self, cutoff: DateTime<Utc>) -> DraftResult<usize>;

    /// Drafts that entered `Publishing` before `cutoff`
    async fn stale_publishing(&self, cutoff: DateTime<Utc>) -> DraftResult<Vec<DraftId>>;
}
