use std::collections::BTreeSet;
use std::sync::Arc;

use quill_blob::SignedUrlBlobStore;
use quill_core::{GroupScope, UserId};
use tracing::{debug, info, instrument};

use crate::ledger::delete_blob_best_effort;
use crate::{Draft, DraftBackend, DraftError, DraftId, DraftPatch, DraftResult, DraftView};

/// Owns the draft lifecycle and the one-editing-draft-per-(owner, group) rule
#[derive(Clone)]
pub struct DraftStore {
    backend: Arc<dyn DraftBackend>,
    blobs: Arc<dyn SignedUrlBlobStore>,
    create_retries: usize,
}

impl DraftStore {
    pub fn new(
        backend: Arc<dyn DraftBackend>,
        blobs: Arc<dyn SignedUrlBlobStore>,
        create_retries: usize,
    ) -> Self {
        Self {
            backend,
            blobs,
            create_retries: create_retries.max(1),
        }
    }

    /// The caller's active draft in the group, created when absent.
    ///
    /// Relies on the backend's unique (owner, group) index: a lost insert race
    /// retries the lookup instead of creating a second draft. A draft that is
    /// mid-publish is not handed out; the caller gets `PublishInProgress` and
    /// can retry once the post lands or the lock is released.
    #[instrument(skip(self), fields(owner = %scope.owner, group = %scope.group))]
    pub async fn create_or_get(&self, scope: &GroupScope) -> DraftResult<DraftView> {
        for attempt in 1..=self.create_retries {
            if let Some(view) = self
                .backend
                .find_active_draft(&scope.owner, &scope.group)
                .await?
            {
                if view.draft.status.is_publishing() {
                    return Err(DraftError::PublishInProgress(view.draft.id.to_string()));
                }
                return Ok(view);
            }

            let draft = Draft::new(scope.owner.clone(), scope.group.clone());
            match self.backend.insert_draft(draft).await {
                Ok(draft) => {
                    info!(draft_id = %draft.id, "draft created");
                    return Ok(DraftView {
                        draft,
                        media: Vec::new(),
                    });
                }
                Err(DraftError::ActiveDraftExists) => {
                    debug!(attempt, "lost draft creation race");
                }
                Err(err) => return Err(err),
            }
        }
        Err(DraftError::ActiveDraftExists)
    }

    /// The active draft of (owner, group) without creating one
    pub async fn current(&self, scope: &GroupScope) -> DraftResult<Option<DraftView>> {
        Ok(self
            .backend
            .find_active_draft(&scope.owner, &scope.group)
            .await?
            .filter(|view| scope.admits(&view.draft.owner, &view.draft.group_id)))
    }

    /// A draft by id, visible only under its stored group
    pub async fn get(&self, scope: &GroupScope, id: &DraftId) -> DraftResult<DraftView> {
        let view = self
            .backend
            .get_draft(id)
            .await?
            .filter(|view| view.draft.group_id == scope.group)
            .ok_or_else(|| DraftError::DraftNotFound(id.to_string()))?;
        if view.draft.owner != scope.owner {
            return Err(DraftError::NotOwned(id.to_string()));
        }
        Ok(view)
    }

    /// A draft by id for its owner, regardless of group
    pub async fn load(&self, caller: &UserId, id: &DraftId) -> DraftResult<DraftView> {
        let view = self
            .backend
            .get_draft(id)
            .await?
            .ok_or_else(|| DraftError::DraftNotFound(id.to_string()))?;
        if &view.draft.owner != caller {
            return Err(DraftError::NotOwned(id.to_string()));
        }
        Ok(view)
    }

    pub async fn list_by_group(&self, scope: &GroupScope) -> DraftResult<Vec<DraftView>> {
        let views = self.backend.list_drafts(&scope.owner, &scope.group).await?;
        Ok(views
            .into_iter()
            .filter(|view| scope.admits(&view.draft.owner, &view.draft.group_id))
            .collect())
    }

    /// Merge title, body and metadata; optionally move an empty draft to another group.
    #[instrument(skip(self, caller, patch), fields(draft_id = %id))]
    pub async fn update(&self, caller: &UserId, id: &DraftId, patch: DraftPatch) -> DraftResult<Draft> {
        if patch.metadata.as_ref().is_some_and(|m| !m.is_object()) {
            return Err(DraftError::invalid("metadata patch must be a JSON object"));
        }
        let draft = self.backend.update_draft(caller, id, &patch).await?;
        debug!(group = %draft.group_id, "draft updated");
        Ok(draft)
    }

    /// Delete the draft with its ledger and sessions. Blobs go best-effort.
    #[instrument(skip(self, caller), fields(draft_id = %id))]
    pub async fn discard(&self, caller: &UserId, id: &DraftId) -> DraftResult<Draft> {
        let removed = self.backend.delete_draft(caller, id).await?;

        let keys: BTreeSet<&str> = removed
            .media
            .iter()
            .map(|m| m.object_key.as_str())
            .chain(removed.sessions.iter().map(|s| s.object_key.as_str()))
            .collect();
        for key in &keys {
            delete_blob_best_effort(self.blobs.as_ref(), key).await;
        }

        info!(
            media = removed.media.len(),
            sessions = removed.sessions.len(),
            "draft discarded"
        );
        Ok(removed.draft)
    }
}
