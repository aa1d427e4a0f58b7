mod common;

use common::{harness, scope};
use quill_core::{GroupId, UserId};
use quill_drafts::{is_contiguous, DraftBackend, DraftError, DraftPatch, MediaId, MediaState};
use serde_json::json;

#[tokio::test]
async fn create_or_get_returns_the_same_draft() {
    let h = harness();
    let s = scope("alice", "g1");

    let first = h.app.drafts.create_or_get(&s).await.unwrap();
    let second = h.app.drafts.create_or_get(&s).await.unwrap();
    assert_eq!(first.draft.id, second.draft.id);
    assert!(first.draft.status.is_editing());

    let other_group = h.app.drafts.create_or_get(&scope("alice", "g2")).await.unwrap();
    let other_user = h.app.drafts.create_or_get(&scope("bob", "g1")).await.unwrap();
    assert_ne!(other_group.draft.id, first.draft.id);
    assert_ne!(other_user.draft.id, first.draft.id);
    assert_eq!(h.backend.draft_count(), 3);
}

#[tokio::test]
async fn update_merges_text_and_metadata() {
    let h = harness();
    let s = scope("alice", "g1");
    let draft_id = h.new_draft(&s).await;

    h.app
        .drafts
        .update(
            &s.owner,
            &draft_id,
            DraftPatch::new()
                .with_title("Weekend plans")
                .with_metadata(json!({"hashtags": ["hike"], "poll": {"q": "when?"}})),
        )
        .await
        .unwrap();

    let draft = h
        .app
        .drafts
        .update(
            &s.owner,
            &draft_id,
            DraftPatch::new()
                .with_body("Who is in?")
                .with_metadata(json!({"poll": null, "mentions": ["@bob"]})),
        )
        .await
        .unwrap();

    assert_eq!(draft.title, "Weekend plans");
    assert_eq!(draft.body, "Who is in?");
    assert_eq!(
        draft.metadata.0,
        json!({"hashtags": ["hike"], "mentions": ["@bob"]})
    );
    assert!(draft.updated_at >= draft.created_at);
}

#[tokio::test]
async fn update_rejects_foreign_missing_and_bad_metadata() {
    let h = harness();
    let s = scope("alice", "g1");
    let draft_id = h.new_draft(&s).await;

    let err = h
        .app
        .drafts
        .update(&UserId::new("mallory"), &draft_id, DraftPatch::new().with_title("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, DraftError::NotOwned(_)));

    let err = h
        .app
        .drafts
        .update(&s.owner, &"drf_missing".into(), DraftPatch::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DraftError::DraftNotFound(_)));

    let err = h
        .app
        .drafts
        .update(&s.owner, &draft_id, DraftPatch::new().with_metadata(json!([1, 2])))
        .await
        .unwrap_err();
    assert!(matches!(err, DraftError::InvalidInput(_)));
}

#[tokio::test]
async fn empty_draft_can_move_group_and_frees_the_old_slot() {
    let h = harness();
    let s = scope("alice", "g1");
    let draft_id = h.new_draft(&s).await;

    let moved = h
        .app
        .drafts
        .update(&s.owner, &draft_id, DraftPatch::new().with_group(GroupId::new("g2")))
        .await
        .unwrap();
    assert_eq!(moved.group_id, GroupId::new("g2"));

    let in_g2 = h.app.drafts.current(&scope("alice", "g2")).await.unwrap().unwrap();
    assert_eq!(in_g2.draft.id, draft_id);
    assert!(h.app.drafts.current(&s).await.unwrap().is_none());

    let fresh = h.app.drafts.create_or_get(&s).await.unwrap();
    assert_ne!(fresh.draft.id, draft_id);
}

#[tokio::test]
async fn group_move_is_refused_with_media_or_occupied_target() {
    let h = harness();
    let s = scope("alice", "g1");
    let draft_id = h.new_draft(&s).await;
    h.attach(&s.owner, &draft_id, "a.png", "image/png").await;

    let err = h
        .app
        .drafts
        .update(&s.owner, &draft_id, DraftPatch::new().with_group(GroupId::new("g2")))
        .await
        .unwrap_err();
    assert!(matches!(err, DraftError::WrongGroup(_)));
    let view = h.app.drafts.get(&s, &draft_id).await.unwrap();
    assert_eq!(view.draft.group_id, s.group);

    let empty = h.new_draft(&scope("alice", "g3")).await;
    let err = h
        .app
        .drafts
        .update(&s.owner, &empty, DraftPatch::new().with_group(GroupId::new("g1")))
        .await
        .unwrap_err();
    assert!(matches!(err, DraftError::ActiveDraftExists));
}

#[tokio::test]
async fn discard_cascades_ledger_sessions_and_blobs() {
    let h = harness();
    let s = scope("alice", "g1");
    let draft_id = h.new_draft(&s).await;
    h.attach(&s.owner, &draft_id, "a.png", "image/png").await;
    let pending = h.initiate(&s.owner, &draft_id, "b.png", "image/png").await;
    h.transfer(&pending, "image/png", b"half");
    assert_eq!(h.blobs.object_count(), 2);

    let discarded = h.app.drafts.discard(&s.owner, &draft_id).await.unwrap();
    assert_eq!(discarded.status.name(), "discarded");

    assert_eq!(h.backend.draft_count(), 0);
    assert_eq!(h.backend.session_count(), 0);
    assert_eq!(h.blobs.object_count(), 0);

    let err = h
        .app
        .uploads
        .finalize(&s.owner, &pending.upload_id)
        .await
        .unwrap_err();
    assert!(matches!(err, DraftError::SessionNotFound(_)));

    let fresh = h.app.drafts.create_or_get(&s).await.unwrap();
    assert_ne!(fresh.draft.id, draft_id);
}

#[tokio::test]
async fn blob_delete_failure_never_blocks_removal() {
    let h = harness();
    let s = scope("alice", "g1");
    let draft_id = h.new_draft(&s).await;
    let first = h.attach(&s.owner, &draft_id, "a.png", "image/png").await;
    h.attach(&s.owner, &draft_id, "b.png", "image/png").await;

    h.blobs.set_fail_deletes(true);

    let remaining = h
        .app
        .ledger
        .remove(&s.owner, &draft_id, &first.media_id)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(h.blobs.object_count(), 2);

    h.app.drafts.discard(&s.owner, &draft_id).await.unwrap();
    assert_eq!(h.backend.draft_count(), 0);
}

#[tokio::test]
async fn remove_compacts_order_and_deletes_blob() {
    let h = harness();
    let s = scope("alice", "g1");
    let draft_id = h.new_draft(&s).await;
    let mut ids = Vec::new();
    for name in ["a.png", "b.png", "c.png"] {
        ids.push(h.attach(&s.owner, &draft_id, name, "image/png").await.media_id);
    }
    let ledger = h.app.ledger.list(&s.owner, &draft_id).await.unwrap();
    let middle_key = ledger[1].object_key.clone();

    let remaining = h
        .app
        .ledger
        .remove(&s.owner, &draft_id, &ids[1])
        .await
        .unwrap();

    assert_eq!(
        remaining.iter().map(|m| &m.id).collect::<Vec<_>>(),
        vec![&ids[0], &ids[2]]
    );
    assert!(is_contiguous(&remaining));
    assert!(!h.blobs.contains(&middle_key));

    let err = h
        .app
        .ledger
        .remove(&s.owner, &draft_id, &ids[1])
        .await
        .unwrap_err();
    assert!(matches!(err, DraftError::MediaNotFound(_)));
}

#[tokio::test]
async fn removing_pending_media_expires_its_session() {
    let h = harness();
    let s = scope("alice", "g1");
    let draft_id = h.new_draft(&s).await;
    let ticket = h.initiate(&s.owner, &draft_id, "a.png", "image/png").await;

    h.app
        .ledger
        .remove(&s.owner, &draft_id, &ticket.media_id)
        .await
        .unwrap();

    h.transfer(&ticket, "image/png", b"late");
    let err = h
        .app
        .uploads
        .finalize(&s.owner, &ticket.upload_id)
        .await
        .unwrap_err();
    assert!(matches!(err, DraftError::SessionExpired(_)));
    assert!(h.app.ledger.list(&s.owner, &draft_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn reorder_is_all_or_nothing() {
    let h = harness();
    let s = scope("alice", "g1");
    let draft_id = h.new_draft(&s).await;
    let mut ids = Vec::new();
    for name in ["a.png", "b.png", "c.png"] {
        ids.push(h.attach(&s.owner, &draft_id, name, "image/png").await.media_id);
    }

    let order = vec![ids[2].clone(), ids[0].clone(), ids[1].clone()];
    let ledger = h.app.ledger.reorder(&s.owner, &draft_id, &order).await.unwrap();
    assert_eq!(ledger.iter().map(|m| m.id.clone()).collect::<Vec<_>>(), order);
    assert!(is_contiguous(&ledger));

    let bad = vec![ids[0].clone(), ids[1].clone(), MediaId::from("med_other")];
    let err = h
        .app
        .ledger
        .reorder(&s.owner, &draft_id, &bad)
        .await
        .unwrap_err();
    assert!(matches!(err, DraftError::OrderMismatch(_)));

    let unchanged = h.app.ledger.list(&s.owner, &draft_id).await.unwrap();
    assert_eq!(unchanged.iter().map(|m| m.id.clone()).collect::<Vec<_>>(), order);
}

#[tokio::test]
async fn publishing_draft_refuses_edits() {
    let h = harness();
    let s = scope("alice", "g1");
    let draft_id = h.new_draft(&s).await;
    let done = h.attach(&s.owner, &draft_id, "a.png", "image/png").await;
    h.backend.force_publishing(&draft_id);

    let err = h
        .app
        .drafts
        .update(&s.owner, &draft_id, DraftPatch::new().with_title("late"))
        .await
        .unwrap_err();
    assert!(matches!(err, DraftError::DraftNotEditable { .. }));

    let err = h
        .app
        .ledger
        .remove(&s.owner, &draft_id, &done.media_id)
        .await
        .unwrap_err();
    assert!(matches!(err, DraftError::DraftNotEditable { .. }));

    let err = h.app.drafts.discard(&s.owner, &draft_id).await.unwrap_err();
    assert!(matches!(err, DraftError::DraftNotEditable { .. }));

    let ledger = h.app.ledger.list(&s.owner, &draft_id).await.unwrap();
    assert!(matches!(ledger[0].state, MediaState::Uploaded { .. }));
}

#[tokio::test]
async fn create_or_get_does_not_hand_out_a_publishing_draft() {
    let h = harness();
    let s = scope("alice", "g1");
    let draft_id = h.new_draft(&s).await;
    h.backend.force_publishing(&draft_id);

    let err = h.app.drafts.create_or_get(&s).await.unwrap_err();
    assert!(matches!(err, DraftError::PublishInProgress(ref id) if *id == draft_id.to_string()));
    assert_eq!(h.backend.draft_count(), 1);

    let current = h.app.drafts.current(&s).await.unwrap().unwrap();
    assert!(current.draft.status.is_publishing());

    assert!(h.backend.release_publish(&draft_id).await.unwrap());
    let view = h.app.drafts.create_or_get(&s).await.unwrap();
    assert_eq!(view.draft.id, draft_id);
}

#[tokio::test]
async fn reads_are_scoped_to_owner_and_group() {
    let h = harness();
    let s = scope("alice", "g1");
    let draft_id = h.new_draft(&s).await;

    let err = h
        .app
        .drafts
        .get(&scope("bob", "g1"), &draft_id)
        .await
        .unwrap_err();
    assert!(matches!(err, DraftError::NotOwned(_)));

    assert!(h
        .app
        .drafts
        .list_by_group(&scope("bob", "g1"))
        .await
        .unwrap()
        .is_empty());

    let err = h
        .app
        .ledger
        .list(&UserId::new("bob"), &draft_id)
        .await
        .unwrap_err();
    assert!(matches!(err, DraftError::NotOwned(_)));
}
