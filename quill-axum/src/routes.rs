use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, OriginalUri, Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use bytes::Bytes;
use quill_core::{GroupId, QuillError};
use quill_drafts::{
    Draft, DraftId, DraftPatch, DraftView, FinalizedUpload, MediaId, MediaRecord, PostId,
    PublishedPost, UploadId, UploadRequest, UploadTicket, Visibility,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use validator::Validate;

use crate::{
    caller::Caller, error::map_json_rejection, validate::validate_body, QuillAxumError, QuillState,
};

type ApiResult<T> = Result<T, QuillAxumError>;

/// Every route. `blob_limit` caps a single signed write and should match the
/// largest file `initiate` accepts.
pub fn routes(blob_limit: usize) -> Router<QuillState> {
    Router::new()
        .route("/health", get(health))
        .route("/groups/{group}/draft", post(create_or_get_draft).get(current_draft))
        .route("/groups/{group}/drafts", get(list_drafts))
        .route(
            "/groups/{group}/drafts/{id}",
            get(get_draft).patch(update_draft).delete(discard_draft),
        )
        .route("/groups/{group}/posts", get(list_posts))
        .route("/groups/{group}/posts/{id}", get(get_post))
        .route("/drafts/{id}/uploads", post(initiate_upload))
        .route("/uploads/{upload_id}/finalize", post(finalize_upload))
        .route("/drafts/{id}/media", get(list_media))
        .route("/drafts/{id}/media/order", put(reorder_media))
        .route("/drafts/{id}/media/{media_id}", delete(remove_media))
        .route("/drafts/{id}/publish", post(publish_draft))
        .route(
            "/blobs/{*key}",
            put(write_blob).layer(DefaultBodyLimit::max(blob_limit)),
        )
        .fallback(not_found)
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(inner)| inner).map_err(map_json_rejection)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn not_found(OriginalUri(uri): OriginalUri) -> QuillAxumError {
    QuillError::not_found(format!("No route for {}", uri.path())).into()
}

// drafts

async fn create_or_get_draft(
    State(state): State<QuillState>,
    caller: Caller,
    Path(group): Path<String>,
) -> ApiResult<Json<DraftView>> {
    let view = state.drafts.drafts.create_or_get(&caller.in_group(group)).await?;
    Ok(Json(view))
}

async fn current_draft(
    State(state): State<QuillState>,
    caller: Caller,
    Path(group): Path<String>,
) -> ApiResult<Json<DraftView>> {
    let scope = caller.in_group(group);
    let view = state
        .drafts
        .drafts
        .current(&scope)
        .await?
        .ok_or_else(|| QuillError::not_found(format!("No active draft in group {}", scope.group)))?;
    Ok(Json(view))
}

async fn list_drafts(
    State(state): State<QuillState>,
    caller: Caller,
    Path(group): Path<String>,
) -> ApiResult<Json<Vec<DraftView>>> {
    let views = state.drafts.drafts.list_by_group(&caller.in_group(group)).await?;
    Ok(Json(views))
}

async fn get_draft(
    State(state): State<QuillState>,
    caller: Caller,
    Path((group, id)): Path<(String, String)>,
) -> ApiResult<Json<DraftView>> {
    let view = state
        .drafts
        .drafts
        .get(&caller.in_group(group), &DraftId::from(id))
        .await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PatchBody {
    pub title: Option<String>,
    pub body: Option<String>,
    pub metadata: Option<Value>,
    #[validate(length(min = 1, message = "group_id must not be empty"))]
    pub group_id: Option<String>,
}

async fn update_draft(
    State(state): State<QuillState>,
    caller: Caller,
    Path((group, id)): Path<(String, String)>,
    body: Result<Json<PatchBody>, JsonRejection>,
) -> ApiResult<Json<Draft>> {
    let body = json_body(body)?;
    validate_body(&body)?;

    // the path group must match before anything is written
    let scope = caller.in_group(group);
    let id = DraftId::from(id);
    state.drafts.drafts.get(&scope, &id).await?;

    let patch = DraftPatch {
        title: body.title,
        body: body.body,
        metadata: body.metadata,
        group_id: body.group_id.map(GroupId::new),
    };
    let draft = state.drafts.drafts.update(&scope.owner, &id, patch).await?;
    Ok(Json(draft))
}

async fn discard_draft(
    State(state): State<QuillState>,
    caller: Caller,
    Path((group, id)): Path<(String, String)>,
) -> ApiResult<Json<Draft>> {
    let scope = caller.in_group(group);
    let id = DraftId::from(id);
    state.drafts.drafts.get(&scope, &id).await?;

    let draft = state.drafts.drafts.discard(&scope.owner, &id).await?;
    Ok(Json(draft))
}

// uploads

#[derive(Debug, Deserialize, Validate)]
pub struct InitiateBody {
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    #[validate(length(min = 1))]
    pub mime_type: String,
    #[validate(range(min = 1))]
    pub declared_size: u64,
    pub replace: Option<String>,
}

async fn initiate_upload(
    State(state): State<QuillState>,
    Caller(user): Caller,
    Path(id): Path<String>,
    body: Result<Json<InitiateBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UploadTicket>)> {
    let body = json_body(body)?;
    validate_body(&body)?;

    let mut request =
        UploadRequest::new(DraftId::from(id), body.filename, body.mime_type, body.declared_size);
    if let Some(media_id) = body.replace {
        request = request.replacing(MediaId::from(media_id));
    }

    let ticket = state.drafts.uploads.initiate(&user, request).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn finalize_upload(
    State(state): State<QuillState>,
    Caller(user): Caller,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<FinalizedUpload>> {
    let done = state
        .drafts
        .uploads
        .finalize(&user, &UploadId::from(upload_id))
        .await?;
    Ok(Json(done))
}

// ledger

async fn list_media(
    State(state): State<QuillState>,
    Caller(user): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<MediaRecord>>> {
    let ledger = state.drafts.ledger.list(&user, &DraftId::from(id)).await?;
    Ok(Json(ledger))
}

async fn remove_media(
    State(state): State<QuillState>,
    Caller(user): Caller,
    Path((id, media_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<MediaRecord>>> {
    let ledger = state
        .drafts
        .ledger
        .remove(&user, &DraftId::from(id), &MediaId::from(media_id))
        .await?;
    Ok(Json(ledger))
}

#[derive(Debug, Deserialize)]
pub struct OrderBody {
    pub order: Vec<String>,
}

async fn reorder_media(
    State(state): State<QuillState>,
    Caller(user): Caller,
    Path(id): Path<String>,
    body: Result<Json<OrderBody>, JsonRejection>,
) -> ApiResult<Json<Vec<MediaRecord>>> {
    let body = json_body(body)?;
    let order: Vec<MediaId> = body.order.into_iter().map(MediaId::from).collect();

    let ledger = state
        .drafts
        .ledger
        .reorder(&user, &DraftId::from(id), &order)
        .await?;
    Ok(Json(ledger))
}

// publish + posts

#[derive(Debug, Default, Deserialize)]
pub struct PublishBody {
    #[serde(default)]
    pub visibility: Visibility,
}

async fn publish_draft(
    State(state): State<QuillState>,
    Caller(user): Caller,
    Path(id): Path<String>,
    body: Result<Json<PublishBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    // an empty request publishes with the default visibility
    let body = match body {
        Ok(Json(body)) => body,
        Err(JsonRejection::MissingJsonContentType(_)) => PublishBody::default(),
        Err(rejection) => return Err(map_json_rejection(rejection)),
    };

    let post_id = state
        .drafts
        .publisher
        .publish(&user, &DraftId::from(id), body.visibility)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "post_id": post_id }))))
}

async fn list_posts(
    State(state): State<QuillState>,
    _caller: Caller,
    Path(group): Path<String>,
) -> ApiResult<Json<Vec<PublishedPost>>> {
    let posts = state.drafts.publisher.list_posts(&GroupId::new(group)).await?;
    Ok(Json(posts))
}

async fn get_post(
    State(state): State<QuillState>,
    _caller: Caller,
    Path((group, id)): Path<(String, String)>,
) -> ApiResult<Json<PublishedPost>> {
    let post = state
        .drafts
        .publisher
        .get_post(&GroupId::new(group), &PostId::from(id))
        .await?;
    Ok(Json(post))
}

// dev blob target

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

async fn write_blob(
    State(state): State<QuillState>,
    Path(key): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let blobs = state
        .dev_blobs
        .as_ref()
        .ok_or_else(|| QuillError::not_found("Blob writes are not served here"))?;

    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let put = blobs.write_with_token(&key, &query.token, content_type, body)?;
    debug!(key, size = put.size_bytes, "dev blob stored");

    Ok(Json(json!({ "etag": put.etag, "size_bytes": put.size_bytes })))
}
