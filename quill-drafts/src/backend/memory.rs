use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use quill_core::{GroupId, UserId};
use tracing::{debug, error};

use crate::backend::{DraftBackend, RemovedDraft, VerifiedObject};
use crate::ledger;
use crate::publish::ensure_publishable;
use crate::{
    Draft, DraftError, DraftId, DraftPatch, DraftResult, DraftStatus, DraftView, MediaId,
    MediaRecord, MediaState, Post, PostId, PostMediaId, PostMediaRecord, PublishedPost,
    SessionStatus, UploadId, UploadSession,
};

/// Points where a one-shot storage failure can be injected (test helper)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    BeforePostInsert,
    AfterPostInsert,
    /// After the first post media row is written
    AfterMediaInsert,
    /// After the post is complete, before the draft is removed
    BeforeDraftDelete,
    /// `release_publish` fails once
    ReleasePublish,
}

#[derive(Debug, Clone)]
struct DraftRow {
    draft: Draft,
    /// Sorted by `order_index`
    media: Vec<MediaRecord>,
}

impl DraftRow {
    fn view(&self) -> DraftView {
        DraftView {
            draft: self.draft.clone(),
            media: self.media.clone(),
        }
    }
}

type ActiveIndex = HashMap<(UserId, GroupId), DraftId>;

/// In-memory draft storage.
///
/// Operations touching several tables take their write locks in the fixed
/// order `active -> drafts -> sessions -> posts` and hold them for the whole
/// step, so each operation is atomic with respect to every other one.
#[derive(Clone, Default)]
pub struct MemoryDraftBackend {
    active: Arc<RwLock<ActiveIndex>>,
    drafts: Arc<RwLock<HashMap<DraftId, DraftRow>>>,
    sessions: Arc<RwLock<HashMap<UploadId, UploadSession>>>,
    posts: Arc<RwLock<HashMap<PostId, PublishedPost>>>,
    faults: Arc<Mutex<Vec<FaultPoint>>>,
}

impl MemoryDraftBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn trip(&self, point: FaultPoint) -> DraftResult<()> {
        let mut faults = self.faults.lock();
        match faults.iter().position(|p| *p == point) {
            Some(pos) => {
                faults.remove(pos);
                Err(DraftError::storage(format!("injected fault at {:?}", point)))
            }
            None => Ok(()),
        }
    }
}

fn editable_row<'a>(
    drafts: &'a mut HashMap<DraftId, DraftRow>,
    owner: &UserId,
    id: &DraftId,
) -> DraftResult<&'a mut DraftRow> {
    let row = drafts
        .get_mut(id)
        .ok_or_else(|| DraftError::DraftNotFound(id.to_string()))?;
    if &row.draft.owner != owner {
        return Err(DraftError::NotOwned(id.to_string()));
    }
    if !row.draft.status.is_editing() {
        return Err(DraftError::DraftNotEditable {
            draft_id: id.to_string(),
            status: row.draft.status.name().to_string(),
        });
    }
    Ok(row)
}

fn expire_if_initiated(session: &mut UploadSession, now: DateTime<Utc>) {
    if session.status == SessionStatus::Initiated {
        session.status = SessionStatus::Expired { expired_at: now };
    }
}

fn post_media(post_id: &PostId, ledger: &[MediaRecord]) -> DraftResult<Vec<PostMediaRecord>> {
    ledger
        .iter()
        .map(|record| {
            let url = record.url().ok_or_else(|| {
                DraftError::integrity(format!("media {} has no url at publish", record.id))
            })?;
            Ok(PostMediaRecord {
                id: PostMediaId::new(),
                post_id: post_id.clone(),
                object_key: record.object_key.clone(),
                url: url.to_string(),
                mime_type: record.mime_type.clone(),
                size_bytes: record.size_bytes,
                order_index: record.order_index,
            })
        })
        .collect()
}

#[async_trait]
impl DraftBackend for MemoryDraftBackend {
    async fn insert_draft(&self, draft: Draft) -> DraftResult<Draft> {
        let mut active = self.active.write();
        let key = (draft.owner.clone(), draft.group_id.clone());
        if active.contains_key(&key) {
            return Err(DraftError::ActiveDraftExists);
        }

        let mut drafts = self.drafts.write();
        active.insert(key, draft.id.clone());
        drafts.insert(
            draft.id.clone(),
            DraftRow {
                draft: draft.clone(),
                media: Vec::new(),
            },
        );
        Ok(draft)
    }

    async fn find_active_draft(
        &self,
        owner: &UserId,
        group: &GroupId,
    ) -> DraftResult<Option<DraftView>> {
        let active = self.active.read();
        let Some(id) = active.get(&(owner.clone(), group.clone())) else {
            return Ok(None);
        };
        let drafts = self.drafts.read();
        Ok(drafts.get(id).map(DraftRow::view))
    }

    async fn get_draft(&self, id: &DraftId) -> DraftResult<Option<DraftView>> {
        Ok(self.drafts.read().get(id).map(DraftRow::view))
    }

    async fn list_drafts(&self, owner: &UserId, group: &GroupId) -> DraftResult<Vec<DraftView>> {
        let drafts = self.drafts.read();
        let mut views: Vec<DraftView> = drafts
            .values()
            .filter(|row| &row.draft.owner == owner && &row.draft.group_id == group)
            .map(DraftRow::view)
            .collect();
        views.sort_by(|a, b| b.draft.updated_at.cmp(&a.draft.updated_at));
        Ok(views)
    }

    async fn update_draft(
        &self,
        owner: &UserId,
        id: &DraftId,
        patch: &DraftPatch,
    ) -> DraftResult<Draft> {
        let mut active = self.active.write();
        let mut drafts = self.drafts.write();
        let row = editable_row(&mut drafts, owner, id)?;

        if let Some(group) = patch.group_id.as_ref().filter(|g| **g != row.draft.group_id) {
            if !row.media.is_empty() {
                return Err(DraftError::WrongGroup(format!(
                    "draft {} has {} media attached and cannot move to group {}",
                    id,
                    row.media.len(),
                    group
                )));
            }
            let target = (owner.clone(), group.clone());
            if active.contains_key(&target) {
                return Err(DraftError::ActiveDraftExists);
            }
            active.remove(&(owner.clone(), row.draft.group_id.clone()));
            active.insert(target, id.clone());
            row.draft.group_id = group.clone();
        }

        if let Some(title) = &patch.title {
            row.draft.title = title.clone();
        }
        if let Some(body) = &patch.body {
            row.draft.body = body.clone();
        }
        if let Some(metadata) = &patch.metadata {
            row.draft.metadata.merge(metadata);
        }
        row.draft.updated_at = Utc::now();
        Ok(row.draft.clone())
    }

    async fn delete_draft(&self, owner: &UserId, id: &DraftId) -> DraftResult<RemovedDraft> {
        let mut active = self.active.write();
        let mut drafts = self.drafts.write();
        let mut sessions = self.sessions.write();

        editable_row(&mut drafts, owner, id)?;
        let row = drafts
            .remove(id)
            .ok_or_else(|| DraftError::DraftNotFound(id.to_string()))?;

        let key = (row.draft.owner.clone(), row.draft.group_id.clone());
        if active.get(&key) == Some(id) {
            active.remove(&key);
        }

        let session_ids: Vec<UploadId> = sessions
            .values()
            .filter(|s| &s.draft_id == id)
            .map(|s| s.id.clone())
            .collect();
        let removed_sessions = session_ids
            .iter()
            .filter_map(|sid| sessions.remove(sid))
            .collect();

        let mut draft = row.draft;
        draft.status = DraftStatus::Discarded { at: Utc::now() };
        Ok(RemovedDraft {
            draft,
            media: row.media,
            sessions: removed_sessions,
        })
    }

    async fn open_upload(
        &self,
        session: UploadSession,
        reuse_slot: bool,
        max_media: usize,
    ) -> DraftResult<MediaRecord> {
        let mut drafts = self.drafts.write();
        let mut sessions = self.sessions.write();
        let row = editable_row(&mut drafts, &session.owner, &session.draft_id)?;

        if row.draft.group_id != session.group_id {
            return Err(DraftError::WrongGroup(format!(
                "draft {} moved to group {} while the upload was being prepared",
                row.draft.id, row.draft.group_id
            )));
        }

        let now = Utc::now();
        let record = if reuse_slot {
            let record = row
                .media
                .iter_mut()
                .find(|r| r.id == session.media_id)
                .ok_or_else(|| DraftError::MediaNotFound(session.media_id.to_string()))?;

            let stale_upload = match &record.state {
                MediaState::Failed { .. } => None,
                MediaState::Pending { upload_id } => {
                    let live = sessions.get(upload_id).is_some_and(|s| {
                        s.status == SessionStatus::Initiated && !s.is_expired_at(now)
                    });
                    if live {
                        return Err(DraftError::invalid(format!(
                            "media {} still has a live upload",
                            record.id
                        )));
                    }
                    Some(upload_id.clone())
                }
                MediaState::Uploaded { .. } => {
                    return Err(DraftError::invalid(format!(
                        "media {} is already uploaded",
                        record.id
                    )));
                }
            };
            if let Some(old) = stale_upload.and_then(|uid| sessions.get_mut(&uid)) {
                expire_if_initiated(old, now);
            }

            record.object_key = session.object_key.clone();
            record.filename = session.filename.clone();
            record.mime_type = session.mime_type.clone();
            record.size_bytes = session.declared_size;
            record.state = MediaState::Pending {
                upload_id: session.id.clone(),
            };
            record.updated_at = now;
            record.clone()
        } else {
            if row.media.len() >= max_media {
                return Err(DraftError::QuotaExceeded { max: max_media });
            }
            let record = MediaRecord {
                id: session.media_id.clone(),
                draft_id: session.draft_id.clone(),
                group_id: session.group_id.clone(),
                object_key: session.object_key.clone(),
                filename: session.filename.clone(),
                mime_type: session.mime_type.clone(),
                size_bytes: session.declared_size,
                order_index: row.media.len() as u32,
                state: MediaState::Pending {
                    upload_id: session.id.clone(),
                },
                created_at: now,
                updated_at: now,
            };
            row.media.push(record.clone());
            record
        };

        row.draft.updated_at = now;
        sessions.insert(session.id.clone(), session);
        Ok(record)
    }

    async fn get_session(&self, id: &UploadId) -> DraftResult<Option<UploadSession>> {
        Ok(self.sessions.read().get(id).cloned())
    }

    async fn complete_upload(
        &self,
        owner: &UserId,
        id: &UploadId,
        object: VerifiedObject,
    ) -> DraftResult<MediaRecord> {
        let mut drafts = self.drafts.write();
        let mut sessions = self.sessions.write();

        let session = sessions
            .get_mut(id)
            .filter(|s| &s.owner == owner)
            .ok_or_else(|| DraftError::SessionNotFound(id.to_string()))?;

        let now = Utc::now();
        match session.status {
            SessionStatus::Initiated if session.is_expired_at(now) => {
                return Err(DraftError::SessionExpired(id.to_string()))
            }
            SessionStatus::Initiated => {}
            SessionStatus::Completed { .. } => {
                return Err(DraftError::SessionAlreadyFinalized(id.to_string()))
            }
            SessionStatus::Expired { .. } => {
                return Err(DraftError::SessionExpired(id.to_string()))
            }
        }

        let row = drafts
            .get_mut(&session.draft_id)
            .ok_or_else(|| DraftError::SessionNotFound(id.to_string()))?;
        if row.draft.group_id != session.group_id {
            return Err(DraftError::WrongGroup(format!(
                "upload {} was bound to group {} but the draft is now in {}",
                id, session.group_id, row.draft.group_id
            )));
        }

        let record = row
            .media
            .iter_mut()
            .find(|r| r.id == session.media_id)
            .ok_or_else(|| DraftError::MediaNotFound(session.media_id.to_string()))?;
        if !matches!(&record.state, MediaState::Pending { upload_id } if upload_id == id) {
            return Err(DraftError::integrity(format!(
                "media {} is {} and not awaiting upload {}",
                record.id,
                record.state.name(),
                id
            )));
        }

        record.state = MediaState::Uploaded {
            url: object.url,
            verified_at: now,
        };
        record.size_bytes = object.size_bytes;
        record.updated_at = now;
        session.status = SessionStatus::Completed { completed_at: now };
        Ok(record.clone())
    }

    async fn fail_upload(&self, id: &UploadId, reason: &str) -> DraftResult<Option<MediaRecord>> {
        let mut drafts = self.drafts.write();
        let mut sessions = self.sessions.write();

        let Some(session) = sessions.get_mut(id) else {
            return Ok(None);
        };
        if session.status != SessionStatus::Initiated {
            return Ok(None);
        }
        let now = Utc::now();
        session.status = SessionStatus::Expired { expired_at: now };

        let record = drafts
            .get_mut(&session.draft_id)
            .and_then(|row| row.media.iter_mut().find(|r| r.id == session.media_id));
        match record {
            Some(record)
                if matches!(&record.state, MediaState::Pending { upload_id } if upload_id == id) =>
            {
                record.state = MediaState::Failed {
                    reason: reason.to_string(),
                    failed_at: now,
                };
                record.updated_at = now;
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn remove_media(
        &self,
        owner: &UserId,
        draft_id: &DraftId,
        media_id: &MediaId,
    ) -> DraftResult<MediaRecord> {
        let mut drafts = self.drafts.write();
        let mut sessions = self.sessions.write();
        let row = editable_row(&mut drafts, owner, draft_id)?;

        let pos = row
            .media
            .iter()
            .position(|r| &r.id == media_id)
            .ok_or_else(|| DraftError::MediaNotFound(media_id.to_string()))?;
        let removed = row.media.remove(pos);

        let now = Utc::now();
        ledger::compact(&mut row.media, now);
        row.draft.updated_at = now;

        if let MediaState::Pending { upload_id } = &removed.state {
            if let Some(session) = sessions.get_mut(upload_id) {
                expire_if_initiated(session, now);
            }
        }
        Ok(removed)
    }

    async fn reorder_media(
        &self,
        owner: &UserId,
        draft_id: &DraftId,
        order: &[MediaId],
    ) -> DraftResult<Vec<MediaRecord>> {
        let mut drafts = self.drafts.write();
        let row = editable_row(&mut drafts, owner, draft_id)?;

        let now = Utc::now();
        ledger::apply_order(&mut row.media, order, now)?;
        row.draft.updated_at = now;
        Ok(row.media.clone())
    }

    async fn begin_publish(&self, owner: &UserId, id: &DraftId) -> DraftResult<DraftView> {
        let mut drafts = self.drafts.write();
        let row = drafts
            .get_mut(id)
            .ok_or_else(|| DraftError::DraftNotFound(id.to_string()))?;
        if &row.draft.owner != owner {
            return Err(DraftError::NotOwned(id.to_string()));
        }
        match row.draft.status {
            DraftStatus::Editing => {}
            DraftStatus::Publishing { .. } => {
                return Err(DraftError::PublishInProgress(id.to_string()))
            }
            DraftStatus::Discarded { .. } => {
                return Err(DraftError::DraftNotFound(id.to_string()))
            }
        }

        ensure_publishable(&row.draft, &row.media)?;
        row.draft.status = DraftStatus::Publishing { since: Utc::now() };
        Ok(row.view())
    }

    async fn release_publish(&self, id: &DraftId) -> DraftResult<bool> {
        self.trip(FaultPoint::ReleasePublish)?;

        let mut drafts = self.drafts.write();
        match drafts.get_mut(id) {
            Some(row) if row.draft.status.is_publishing() => {
                row.draft.status = DraftStatus::Editing;
                row.draft.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit_publish(&self, id: &DraftId, post: Post) -> DraftResult<PublishedPost> {
        let mut active = self.active.write();
        let mut drafts = self.drafts.write();
        let mut sessions = self.sessions.write();
        let mut posts = self.posts.write();

        let row = drafts
            .get(id)
            .ok_or_else(|| DraftError::DraftNotFound(id.to_string()))?;
        if !row.draft.status.is_publishing() {
            return Err(DraftError::integrity(format!(
                "draft {} is {} and not locked for publishing",
                id,
                row.draft.status.name()
            )));
        }
        if post.group_id != row.draft.group_id || post.author != row.draft.owner {
            return Err(DraftError::integrity(format!(
                "post {} does not match the scope of draft {}",
                post.id, id
            )));
        }
        ensure_publishable(&row.draft, &row.media)?;
        let media = post_media(&post.id, &row.media)?;

        let post_id = post.id.clone();
        let staged = self.stage_post(&mut posts, post, media);
        if let Err(err) = staged {
            posts.remove(&post_id);
            error!(draft_id = %id, post_id = %post_id, error = %err, "publish commit rolled back");
            return Err(err);
        }

        let Some(row) = drafts.remove(id) else {
            posts.remove(&post_id);
            return Err(DraftError::DraftNotFound(id.to_string()));
        };
        let key = (row.draft.owner.clone(), row.draft.group_id.clone());
        if active.get(&key) == Some(id) {
            active.remove(&key);
        }
        sessions.retain(|_, s| &s.draft_id != id);

        debug!(draft_id = %id, post_id = %post_id, "publish committed");
        posts
            .get(&post_id)
            .cloned()
            .ok_or_else(|| DraftError::integrity(format!("post {} vanished during commit", post_id)))
    }

    async fn get_post(&self, id: &PostId) -> DraftResult<Option<PublishedPost>> {
        Ok(self.posts.read().get(id).cloned())
    }

    async fn list_posts(&self, group: &GroupId) -> DraftResult<Vec<PublishedPost>> {
        let posts = self.posts.read();
        let mut found: Vec<PublishedPost> = posts
            .values()
            .filter(|p| &p.post.group_id == group)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.post
                .created_at
                .cmp(&a.post.created_at)
                .then_with(|| a.post.id.cmp(&b.post.id))
        });
        Ok(found)
    }

    async fn expired_sessions(&self, now: DateTime<Utc>) -> DraftResult<Vec<UploadId>> {
        Ok(self
            .sessions
            .read()
            .values()
            .filter(|s| s.status == SessionStatus::Initiated && s.is_expired_at(now))
            .map(|s| s.id.clone())
            .collect())
    }

    async fn purge_sessions(&self, cutoff: DateTime<Utc>) -> DraftResult<usize> {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| match s.status {
            SessionStatus::Initiated => true,
            SessionStatus::Completed { completed_at } => completed_at >= cutoff,
            SessionStatus::Expired { expired_at } => expired_at >= cutoff,
        });
        Ok(before - sessions.len())
    }

    async fn stale_publishing(&self, cutoff: DateTime<Utc>) -> DraftResult<Vec<DraftId>> {
        Ok(self
            .drafts
            .read()
            .values()
            .filter(|row| matches!(row.draft.status, DraftStatus::Publishing { since } if since < cutoff))
            .map(|row| row.draft.id.clone())
            .collect())
    }
}

impl MemoryDraftBackend {
    fn stage_post(
        &self,
        posts: &mut HashMap<PostId, PublishedPost>,
        post: Post,
        media: Vec<PostMediaRecord>,
    ) -> DraftResult<()> {
        self.trip(FaultPoint::BeforePostInsert)?;
        let post_id = post.id.clone();
        posts.insert(
            post_id.clone(),
            PublishedPost {
                post,
                media: Vec::with_capacity(media.len()),
            },
        );
        self.trip(FaultPoint::AfterPostInsert)?;

        for (i, record) in media.into_iter().enumerate() {
            if let Some(published) = posts.get_mut(&post_id) {
                published.media.push(record);
            }
            if i == 0 {
                self.trip(FaultPoint::AfterMediaInsert)?;
            }
        }

        self.trip(FaultPoint::BeforeDraftDelete)
    }
}

/// Test helpers for deterministic testing
impl MemoryDraftBackend {
    /// Fail the next operation that reaches `point` (test helper)
    pub fn inject_fault(&self, point: FaultPoint) {
        self.faults.lock().push(point);
    }

    /// Move a session's expiry into the past (test helper)
    pub fn force_session_expiry(&self, id: &UploadId) {
        if let Some(session) = self.sessions.write().get_mut(id) {
            session.expires_at = Utc::now() - Duration::seconds(1);
        }
    }

    /// Pretend a publishing draft took its lock `age` ago (test helper)
    pub fn force_publish_age(&self, id: &DraftId, age: Duration) {
        if let Some(row) = self.drafts.write().get_mut(id) {
            if let DraftStatus::Publishing { since } = &mut row.draft.status {
                *since = Utc::now() - age;
            }
        }
    }

    /// Put a draft into `Publishing` without committing (test helper)
    pub fn force_publishing(&self, id: &DraftId) {
        if let Some(row) = self.drafts.write().get_mut(id) {
            row.draft.status = DraftStatus::Publishing { since: Utc::now() };
        }
    }

    pub fn draft_count(&self) -> usize {
        self.drafts.read().len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn post_count(&self) -> usize {
        self.posts.read().len()
    }
}
