use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quill_blob::BlobError;
use quill_core::QuillError;
use quill_drafts::DraftError;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub struct QuillAxumError(pub anyhow::Error);

impl From<anyhow::Error> for QuillAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<QuillError> for QuillAxumError {
    fn from(e: QuillError) -> Self {
        Self(e.into_anyhow())
    }
}

impl From<DraftError> for QuillAxumError {
    fn from(e: DraftError) -> Self {
        QuillError::from(e).into()
    }
}

impl From<BlobError> for QuillAxumError {
    fn from(e: BlobError) -> Self {
        let quill = match &e {
            BlobError::SignatureExpired | BlobError::SignatureInvalid { .. } => {
                QuillError::forbidden(e.to_string())
            }
            BlobError::NotFound { .. } => QuillError::not_found(e.to_string()),
            BlobError::Invalid { .. } => QuillError::bad_request(e.to_string()),
            _ => QuillError::unavailable(e.to_string()),
        };
        quill.into()
    }
}

pub(crate) fn map_json_rejection(rejection: JsonRejection) -> QuillAxumError {
    QuillError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.body_text()]}))
        .into()
}

impl IntoResponse for QuillAxumError {
    fn into_response(self) -> Response {
        // Keep the structured fields when a QuillError sits anywhere in the chain
        let quill = match QuillError::find_in(&self.0) {
            Some(quill) => quill.sanitize_for_client(),
            None => QuillError::general_error(self.0.to_string()).sanitize_for_client(),
        };

        let status = StatusCode::from_u16(quill.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if quill.kind.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(quill.to_json())).into_response()
    }
}
