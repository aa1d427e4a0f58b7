use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use quill_core::{GroupId, UserId};
use tracing::{error, info, instrument, warn};

use crate::{
    Draft, DraftBackend, DraftError, DraftId, DraftResult, MediaRecord, MediaState, Post, PostId,
    PublishedPost, Visibility,
};

const RELEASE_ATTEMPTS: u32 = 3;
const RELEASE_BACKOFF: Duration = Duration::from_millis(20);

/// Publish precondition, checked before the lock and again under it.
///
/// Non-uploaded media is reported before emptiness so a draft holding only
/// in-flight uploads says `MediaNotReady` rather than `EmptyPost`.
pub fn ensure_publishable(draft: &Draft, media: &[MediaRecord]) -> DraftResult<()> {
    let pending = media
        .iter()
        .filter(|m| matches!(m.state, MediaState::Pending { .. }))
        .count();
    let failed = media
        .iter()
        .filter(|m| matches!(m.state, MediaState::Failed { .. }))
        .count();
    if pending + failed > 0 {
        return Err(DraftError::MediaNotReady { pending, failed });
    }

    let has_media = media.iter().any(|m| m.state.is_uploaded());
    if !(draft.has_text()
        || has_media
        || draft.metadata.has_poll()
        || draft.metadata.has_link_preview())
    {
        return Err(DraftError::EmptyPost);
    }
    Ok(())
}

/// Promotes a draft and its ledger into an immutable post
#[derive(Clone)]
pub struct PublishCoordinator {
    backend: Arc<dyn DraftBackend>,
}

impl PublishCoordinator {
    pub fn new(backend: Arc<dyn DraftBackend>) -> Self {
        Self { backend }
    }

    /// `editing -> publishing -> {published, editing}`.
    ///
    /// On any commit failure the draft lands back in `editing` with its
    /// ledger untouched and no post exists.
    #[instrument(skip(self, caller), fields(draft_id = %draft_id, visibility = ?visibility))]
    pub async fn publish(
        &self,
        caller: &UserId,
        draft_id: &DraftId,
        visibility: Visibility,
    ) -> DraftResult<PostId> {
        let view = self
            .backend
            .get_draft(draft_id)
            .await?
            .ok_or_else(|| DraftError::DraftNotFound(draft_id.to_string()))?;
        if &view.draft.owner != caller {
            return Err(DraftError::NotOwned(draft_id.to_string()));
        }
        if view.draft.status.is_publishing() {
            return Err(DraftError::PublishInProgress(draft_id.to_string()));
        }
        ensure_publishable(&view.draft, &view.media)?;

        let locked = self.backend.begin_publish(caller, draft_id).await?;
        let post = Post {
            id: PostId::new(),
            author: locked.draft.owner.clone(),
            group_id: locked.draft.group_id.clone(),
            title: locked.draft.title.clone(),
            body: locked.draft.body.clone(),
            metadata: locked.draft.metadata.clone(),
            visibility,
            created_at: Utc::now(),
        };

        match self.backend.commit_publish(draft_id, post).await {
            Ok(published) => {
                info!(
                    post_id = %published.post.id,
                    media = published.media.len(),
                    "draft published"
                );
                Ok(published.post.id)
            }
            Err(err) => {
                error!(error = %err, "publish failed; returning draft to editing");
                self.release(draft_id).await;
                Err(err)
            }
        }
    }

    async fn release(&self, draft_id: &DraftId) {
        for attempt in 1..=RELEASE_ATTEMPTS {
            match self.backend.release_publish(draft_id).await {
                Ok(_) => return,
                Err(err) => {
                    warn!(attempt, error = %err, "releasing publish lock failed");
                    if attempt < RELEASE_ATTEMPTS {
                        tokio::time::sleep(RELEASE_BACKOFF * attempt).await;
                    }
                }
            }
        }
        error!(draft_id = %draft_id, "publish lock left held; the reaper will release it");
    }

    /// A post with its ordered media, visible only under its stored group
    pub async fn get_post(&self, group: &GroupId, post_id: &PostId) -> DraftResult<PublishedPost> {
        self.backend
            .get_post(post_id)
            .await?
            .filter(|p| &p.post.group_id == group)
            .ok_or_else(|| DraftError::PostNotFound(post_id.to_string()))
    }

    pub async fn list_posts(&self, group: &GroupId) -> DraftResult<Vec<PublishedPost>> {
        let posts = self.backend.list_posts(group).await?;
        Ok(posts
            .into_iter()
            .filter(|p| &p.post.group_id == group)
            .collect())
    }
}
