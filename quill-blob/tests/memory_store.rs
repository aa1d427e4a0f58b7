use bytes::Bytes;
use quill_blob::{BlobError, BlobStore, MemoryBlobStore, SignedUrlBlobStore};

fn store() -> MemoryBlobStore {
    MemoryBlobStore::new("http://localhost:3030/blobs")
}

#[tokio::test]
async fn signed_put_writes_object_and_overwrites_on_retry() {
    let store = store();
    let target = store
        .sign_put("drafts/g/d/u.png", Some("image/png"), 60)
        .await
        .unwrap();

    assert_eq!(target.method, "PUT");
    assert!(target.url.starts_with("http://localhost:3030/blobs/drafts/g/d/u.png?token="));
    assert!(target
        .headers
        .iter()
        .any(|(k, v)| k == "content-type" && v == "image/png"));

    store
        .write_signed(&target.url, Some("image/png"), Bytes::from_static(b"first"))
        .unwrap();
    store
        .write_signed(&target.url, Some("image/png"), Bytes::from_static(b"second!"))
        .unwrap();

    assert_eq!(store.object_count(), 1);
    let head = store.head("drafts/g/d/u.png").await.unwrap();
    assert_eq!(head.size_bytes, 7);
    assert_eq!(head.content_type.as_deref(), Some("image/png"));
    assert_eq!(
        store.object_url("drafts/g/d/u.png"),
        "http://localhost:3030/blobs/drafts/g/d/u.png"
    );
}

#[tokio::test]
async fn signed_put_rejects_wrong_content_type_and_expired_grants() {
    let store = store();
    let target = store.sign_put("k.png", Some("image/png"), 60).await.unwrap();

    let err = store
        .write_signed(&target.url, Some("image/gif"), Bytes::from_static(b"x"))
        .unwrap_err();
    assert!(matches!(err, BlobError::SignatureInvalid { .. }));

    store.expire_grants();
    let err = store
        .write_signed(&target.url, Some("image/png"), Bytes::from_static(b"x"))
        .unwrap_err();
    assert!(matches!(err, BlobError::SignatureExpired));
    assert!(!store.contains("k.png"));
}

#[tokio::test]
async fn token_is_bound_to_its_key() {
    let store = store();
    let target = store.sign_put("a.png", None, 60).await.unwrap();
    let token = target.url.split("token=").nth(1).unwrap().to_string();

    let err = store
        .write_with_token("b.png", &token, None, Bytes::from_static(b"x"))
        .unwrap_err();
    assert!(matches!(err, BlobError::SignatureInvalid { .. }));
}

#[tokio::test]
async fn head_of_missing_object_is_not_found_and_delete_is_idempotent() {
    let store = store();
    let err = store.head("missing").await.unwrap_err();
    assert!(err.is_not_found());

    store.delete("missing").await.unwrap();

    store.set_fail_deletes(true);
    assert!(store.delete("missing").await.is_err());
}

#[tokio::test]
async fn signing_prunes_lapsed_grants() {
    let store = store();
    store.sign_put("a.png", None, 0).await.unwrap();
    store.sign_put("b.png", None, 0).await.unwrap();
    assert_eq!(store.grant_count(), 1);

    let live = store.sign_put("c.png", None, 60).await.unwrap();
    assert_eq!(store.grant_count(), 1);

    store.sign_put("d.png", None, 60).await.unwrap();
    assert_eq!(store.grant_count(), 2);
    store
        .write_signed(&live.url, None, Bytes::from_static(b"x"))
        .unwrap();
}

#[tokio::test]
async fn out_of_range_ttl_is_rejected() {
    let store = store();
    let err = store.sign_put("k.png", None, u64::MAX).await.unwrap_err();
    assert!(matches!(err, BlobError::Invalid { .. }));
    assert_eq!(store.grant_count(), 0);
}
