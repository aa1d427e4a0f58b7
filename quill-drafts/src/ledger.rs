//! Draft-media ledger: the ordered, gap-free list of media attached to a draft.
//!
//! The ordering helpers here are pure and run inside backend operations while
//! the draft row is locked. [`MediaLedger`] is the caller-facing service.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use quill_blob::SignedUrlBlobStore;
use quill_core::UserId;
use tracing::{info, instrument, warn};

use crate::{DraftBackend, DraftError, DraftId, DraftResult, MediaId, MediaRecord};

/// True when `order_index` values are exactly `0..len` with no duplicates.
pub fn is_contiguous(records: &[MediaRecord]) -> bool {
    let mut indexes: Vec<u32> = records.iter().map(|r| r.order_index).collect();
    indexes.sort_unstable();
    indexes
        .iter()
        .enumerate()
        .all(|(expected, actual)| *actual as usize == expected)
}

/// Sort by `order_index` and renumber from 0, keeping relative order.
pub(crate) fn compact(records: &mut [MediaRecord], now: DateTime<Utc>) {
    records.sort_by_key(|r| r.order_index);
    for (index, record) in records.iter_mut().enumerate() {
        let index = index as u32;
        if record.order_index != index {
            record.order_index = index;
            record.updated_at = now;
        }
    }
}

/// Rewrite every `order_index` so the ledger follows `order`.
///
/// `order` must name each current record exactly once; on mismatch nothing
/// is modified.
pub(crate) fn apply_order(
    records: &mut [MediaRecord],
    order: &[MediaId],
    now: DateTime<Utc>,
) -> DraftResult<()> {
    if order.len() != records.len() {
        return Err(DraftError::OrderMismatch(format!(
            "expected {} ids, got {}",
            records.len(),
            order.len()
        )));
    }

    let mut seen = HashSet::with_capacity(order.len());
    for id in order {
        if !seen.insert(id) {
            return Err(DraftError::OrderMismatch(format!("duplicate id {}", id)));
        }
    }

    let positions: HashMap<&MediaId, u32> = order
        .iter()
        .enumerate()
        .map(|(index, id)| (id, index as u32))
        .collect();
    if let Some(unknown) = records.iter().find(|r| !positions.contains_key(&r.id)) {
        return Err(DraftError::OrderMismatch(format!("missing id {}", unknown.id)));
    }

    for record in records.iter_mut() {
        let index = positions[&record.id];
        if record.order_index != index {
            record.order_index = index;
            record.updated_at = now;
        }
    }
    records.sort_by_key(|r| r.order_index);
    Ok(())
}

/// Delete a blob without letting the failure escape.
///
/// Orphans left behind are reconciled by an external sweep.
pub(crate) async fn delete_blob_best_effort(blobs: &dyn SignedUrlBlobStore, key: &str) {
    if let Err(err) = blobs.delete(key).await {
        warn!(key, error = %err, "blob delete failed; leaving orphan for sweep");
    }
}

/// Remove and reorder media on an editing draft
#[derive(Clone)]
pub struct MediaLedger {
    backend: Arc<dyn DraftBackend>,
    blobs: Arc<dyn SignedUrlBlobStore>,
}

impl MediaLedger {
    pub fn new(backend: Arc<dyn DraftBackend>, blobs: Arc<dyn SignedUrlBlobStore>) -> Self {
        Self { backend, blobs }
    }

    /// Ordered ledger of a draft owned by `caller`
    pub async fn list(&self, caller: &UserId, draft_id: &DraftId) -> DraftResult<Vec<MediaRecord>> {
        let view = self
            .backend
            .get_draft(draft_id)
            .await?
            .ok_or_else(|| DraftError::DraftNotFound(draft_id.to_string()))?;
        if &view.draft.owner != caller {
            return Err(DraftError::NotOwned(draft_id.to_string()));
        }
        Ok(view.media)
    }

    /// Drop one record and compact the ledger; the blob goes best-effort.
    #[instrument(skip(self, caller), fields(draft_id = %draft_id, media_id = %media_id))]
    pub async fn remove(
        &self,
        caller: &UserId,
        draft_id: &DraftId,
        media_id: &MediaId,
    ) -> DraftResult<Vec<MediaRecord>> {
        let removed = self.backend.remove_media(caller, draft_id, media_id).await?;
        info!(object_key = %removed.object_key, "media removed from draft");

        delete_blob_best_effort(self.blobs.as_ref(), &removed.object_key).await;
        self.list(caller, draft_id).await
    }

    /// All-or-nothing reorder; `order` must be a permutation of the ledger.
    #[instrument(skip(self, caller, order), fields(draft_id = %draft_id, count = order.len()))]
    pub async fn reorder(
        &self,
        caller: &UserId,
        draft_id: &DraftId,
        order: &[MediaId],
    ) -> DraftResult<Vec<MediaRecord>> {
        self.backend.reorder_media(caller, draft_id, order).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MediaState, UploadId};
    use quill_core::GroupId;

    fn record(id: &str, order_index: u32) -> MediaRecord {
        let now = Utc::now();
        MediaRecord {
            id: MediaId::from(id),
            draft_id: DraftId::from("drf_1"),
            group_id: GroupId::new("g"),
            object_key: format!("k/{}", id),
            filename: format!("{}.png", id),
            mime_type: "image/png".to_string(),
            size_bytes: 1,
            order_index,
            state: MediaState::Pending {
                upload_id: UploadId::new(),
            },
            created_at: now,
            updated_at: now,
        }
    }

    fn ids(records: &[MediaRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn contiguity() {
        assert!(is_contiguous(&[]));
        assert!(is_contiguous(&[record("a", 1), record("b", 0)]));
        assert!(!is_contiguous(&[record("a", 0), record("b", 2)]));
        assert!(!is_contiguous(&[record("a", 0), record("b", 0)]));
    }

    #[test]
    fn compact_closes_gaps_in_order() {
        let mut records = vec![record("c", 4), record("a", 0), record("b", 2)];
        compact(&mut records, Utc::now());

        assert_eq!(ids(&records), vec!["a", "b", "c"]);
        assert!(is_contiguous(&records));
    }

    #[test]
    fn apply_order_rewrites_every_index() {
        let mut records = vec![record("a", 0), record("b", 1), record("c", 2)];
        let order = vec![MediaId::from("c"), MediaId::from("a"), MediaId::from("b")];

        apply_order(&mut records, &order, Utc::now()).unwrap();

        assert_eq!(ids(&records), vec!["c", "a", "b"]);
        assert_eq!(records[0].order_index, 0);
        assert_eq!(records[2].order_index, 2);
    }

    #[test]
    fn apply_order_rejects_non_permutations_without_changes() {
        let original = vec![record("a", 0), record("b", 1)];

        for order in [
            vec![MediaId::from("a")],
            vec![MediaId::from("a"), MediaId::from("a")],
            vec![MediaId::from("a"), MediaId::from("z")],
            vec![MediaId::from("a"), MediaId::from("b"), MediaId::from("c")],
        ] {
            let mut records = original.clone();
            let err = apply_order(&mut records, &order, Utc::now()).unwrap_err();
            assert!(matches!(err, DraftError::OrderMismatch(_)));
            assert_eq!(records, original);
        }
    }
}
