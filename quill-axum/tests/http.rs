use quill_axum::axum::{
    body::Body,
    http::{HeaderValue, Request, StatusCode},
    response::Response,
    Router,
};
use quill_axum::{router, QuillState};
use quill_drafts::DraftsConfig;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const BASE: &str = "http://quill.test";

fn app() -> Router {
    router(QuillState::in_memory(DraftsConfig::default(), format!("{BASE}/blobs")))
}

async fn json_body(res: Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}

async fn call(app: &Router, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Response {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        req = req.header("x-user-id", user);
    }
    let req = match body {
        Some(body) => req
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(req).await.unwrap()
}

async fn call_json(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let res = call(app, method, uri, user, body).await;
    let status = res.status();
    (status, json_body(res).await)
}

async fn new_draft(app: &Router, user: &str, group: &str) -> String {
    let (status, body) = call_json(app, "POST", &format!("/groups/{group}/draft"), Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    body["draft"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_open() {
    let (status, body) = call_json(&app(), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_user_header_is_not_authenticated() {
    let (status, body) = call_json(&app(), "POST", "/groups/g1/draft", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["name"], "NotAuthenticated");
    assert_eq!(body["className"], "not-authenticated");
}

#[tokio::test]
async fn create_is_idempotent_per_group() {
    let app = app();
    let first = new_draft(&app, "alice", "g1").await;
    let again = new_draft(&app, "alice", "g1").await;
    assert_eq!(first, again);

    let (status, body) = call_json(&app, "GET", "/groups/g1/draft", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["draft"]["id"], first.as_str());
    assert_eq!(body["draft"]["status"]["state"], "editing");

    let (status, body) = call_json(&app, "GET", "/groups/g2/draft", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["name"], "NotFound");
}

#[tokio::test]
async fn drafts_are_hidden_from_other_groups() {
    let app = app();
    let id = new_draft(&app, "alice", "g1").await;

    let (status, body) =
        call_json(&app, "GET", &format!("/groups/g2/drafts/{id}"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["code"], "draft_not_found");

    let (status, body) =
        call_json(&app, "GET", &format!("/groups/g1/drafts/{id}"), Some("bob"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["data"]["code"], "not_owned");
    assert_eq!(body["data"]["class"], "authorization");
}

#[tokio::test]
async fn upload_transfer_finalize_and_publish() {
    let app = app();
    let id = new_draft(&app, "alice", "g1").await;

    let (status, _) = call_json(
        &app,
        "PATCH",
        &format!("/groups/g1/drafts/{id}"),
        Some("alice"),
        Some(json!({"title": "Cats", "metadata": {"hashtags": ["cats"]}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, ticket) = call_json(
        &app,
        "POST",
        &format!("/drafts/{id}/uploads"),
        Some("alice"),
        Some(json!({"filename": "cat.png", "mime_type": "image/png", "declared_size": 4})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(ticket["order_index"], 0);
    assert_eq!(ticket["method"], "PUT");

    let upload_url = ticket["upload_url"].as_str().unwrap();
    let path = upload_url.strip_prefix(BASE).unwrap();
    let put = Request::builder()
        .method("PUT")
        .uri(path)
        .header("content-type", "image/png")
        .body(Body::from("abcd"))
        .unwrap();
    let res = app.clone().oneshot(put).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let upload_id = ticket["upload_id"].as_str().unwrap();
    let (status, done) = call_json(
        &app,
        "POST",
        &format!("/uploads/{upload_id}/finalize"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["file_size"], 4);
    assert_eq!(done["media_id"], ticket["media_id"]);

    let (status, body) = call_json(
        &app,
        "POST",
        &format!("/drafts/{id}/publish"),
        Some("alice"),
        Some(json!({"visibility": "members"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let post_id = body["post_id"].as_str().unwrap().to_string();

    let (status, post) =
        call_json(&app, "GET", &format!("/groups/g1/posts/{post_id}"), Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(post["post"]["title"], "Cats");
    assert_eq!(post["post"]["visibility"], "members");
    assert_eq!(post["media"].as_array().unwrap().len(), 1);
    assert_eq!(post["media"][0]["size_bytes"], 4);

    let (status, _) =
        call_json(&app, "GET", &format!("/groups/g2/posts/{post_id}"), Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call_json(&app, "GET", "/groups/g1/draft", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn signed_write_accepts_bodies_up_to_the_file_ceiling() {
    const SIZE: usize = 3 * 1024 * 1024;
    let app = app();
    let id = new_draft(&app, "alice", "g1").await;

    let (status, ticket) = call_json(
        &app,
        "POST",
        &format!("/drafts/{id}/uploads"),
        Some("alice"),
        Some(json!({"filename": "photo.jpg", "mime_type": "image/jpeg", "declared_size": SIZE})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let path = ticket["upload_url"].as_str().unwrap().strip_prefix(BASE).unwrap();
    let put = Request::builder()
        .method("PUT")
        .uri(path)
        .header("content-type", "image/jpeg")
        .body(Body::from(vec![0u8; SIZE]))
        .unwrap();
    let res = app.clone().oneshot(put).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["size_bytes"], SIZE);

    let upload_id = ticket["upload_id"].as_str().unwrap();
    let (status, done) = call_json(
        &app,
        "POST",
        &format!("/uploads/{upload_id}/finalize"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["file_size"], SIZE);
}

#[tokio::test]
async fn signed_write_over_the_file_ceiling_is_413() {
    let app = router(QuillState::in_memory(
        DraftsConfig::default().with_max_file_bytes(1024),
        format!("{BASE}/blobs"),
    ));
    let id = new_draft(&app, "alice", "g1").await;
    let (_, ticket) = call_json(
        &app,
        "POST",
        &format!("/drafts/{id}/uploads"),
        Some("alice"),
        Some(json!({"filename": "a.png", "mime_type": "image/png", "declared_size": 1024})),
    )
    .await;

    let path = ticket["upload_url"].as_str().unwrap().strip_prefix(BASE).unwrap();
    let put = Request::builder()
        .method("PUT")
        .uri(path)
        .header("content-type", "image/png")
        .body(Body::from(vec![0u8; 2048]))
        .unwrap();
    let res = app.clone().oneshot(put).await.unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn empty_publish_carries_machine_code() {
    let app = app();
    let id = new_draft(&app, "alice", "g1").await;

    let (status, body) =
        call_json(&app, "POST", &format!("/drafts/{id}/publish"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["name"], "Unprocessable");
    assert_eq!(body["code"], 422);
    assert_eq!(body["data"]["code"], "empty_post");
    assert_eq!(body["data"]["class"], "validation");
    assert_eq!(body["data"]["retryable"], false);
}

#[tokio::test]
async fn finalize_without_transfer_is_object_missing() {
    let app = app();
    let id = new_draft(&app, "alice", "g1").await;
    let (_, ticket) = call_json(
        &app,
        "POST",
        &format!("/drafts/{id}/uploads"),
        Some("alice"),
        Some(json!({"filename": "a.png", "mime_type": "image/png", "declared_size": 10})),
    )
    .await;

    let upload_id = ticket["upload_id"].as_str().unwrap();
    let (status, body) = call_json(
        &app,
        "POST",
        &format!("/uploads/{upload_id}/finalize"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["data"]["code"], "object_missing");
}

#[tokio::test]
async fn unsupported_type_is_415() {
    let app = app();
    let id = new_draft(&app, "alice", "g1").await;
    let (status, body) = call_json(
        &app,
        "POST",
        &format!("/drafts/{id}/uploads"),
        Some("alice"),
        Some(json!({"filename": "a.exe", "mime_type": "application/x-msdownload", "declared_size": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["data"]["code"], "unsupported_type");
}

#[tokio::test]
async fn invalid_body_lists_field_errors() {
    let app = app();
    let id = new_draft(&app, "alice", "g1").await;
    let (status, body) = call_json(
        &app,
        "POST",
        &format!("/drafts/{id}/uploads"),
        Some("alice"),
        Some(json!({"filename": "", "mime_type": "image/png", "declared_size": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["filename"].is_array());
    assert!(body["errors"]["declared_size"].is_array());
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let app = app();
    let id = new_draft(&app, "alice", "g1").await;
    let req = Request::builder()
        .method("PATCH")
        .uri(format!("/groups/g1/drafts/{id}"))
        .header("x-user-id", "alice")
        .header("content-type", "application/json")
        .body(Body::from("{\"title\":"))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = json_body(res).await;
    assert_eq!(body["className"], "bad-request");
    assert!(body["errors"]["_schema"].is_array());
}

#[tokio::test]
async fn reorder_rejects_a_partial_order() {
    let app = app();
    let id = new_draft(&app, "alice", "g1").await;
    for name in ["a.png", "b.png"] {
        call_json(
            &app,
            "POST",
            &format!("/drafts/{id}/uploads"),
            Some("alice"),
            Some(json!({"filename": name, "mime_type": "image/png", "declared_size": 1})),
        )
        .await;
    }
    let (_, ledger) = call_json(&app, "GET", &format!("/drafts/{id}/media"), Some("alice"), None).await;
    let first = ledger[0]["id"].clone();
    let second = ledger[1]["id"].clone();

    let (status, body) = call_json(
        &app,
        "PUT",
        &format!("/drafts/{id}/media/order"),
        Some("alice"),
        Some(json!({"order": [first]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["data"]["code"], "order_mismatch");

    let (status, ledger) = call_json(
        &app,
        "PUT",
        &format!("/drafts/{id}/media/order"),
        Some("alice"),
        Some(json!({"order": [second, first]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger[0]["id"], second);
    assert_eq!(ledger[0]["order_index"], 0);
}

#[tokio::test]
async fn request_id_is_generated_or_echoed() {
    let app = app();
    let res = call(&app, "GET", "/health", None, None).await;
    assert!(res.headers().get("x-request-id").is_some());

    let req = Request::builder()
        .uri("/health")
        .header("x-request-id", HeaderValue::from_static("req-test-123"))
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.headers().get("x-request-id").unwrap(), "req-test-123");
}

#[tokio::test]
async fn unknown_route_is_structured_not_found() {
    let (status, body) = call_json(&app(), "GET", "/nope", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["className"], "not-found");
}
