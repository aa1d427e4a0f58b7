use quill_blob::BlobError;
use quill_core::{ErrorKind, QuillError};
use serde_json::json;
use thiserror::Error;

/// Result type for draft, upload and publish operations
pub type DraftResult<T> = Result<T, DraftError>;

/// Failure classes callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad input; retrying the same request will fail again
    Validation,
    /// Caller does not own the target, or it belongs to another group
    Authorization,
    NotFound,
    /// Current state forbids the operation
    Conflict,
    /// Storage hiccup; the same request may succeed later
    Transient,
    /// Stored data disagrees with itself
    Integrity,
}

impl ErrorClass {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Transient => "transient",
            Self::Integrity => "integrity",
        }
    }
}

#[derive(Error, Debug)]
pub enum DraftError {
    #[error("Unsupported media type: {mime_type}")]
    UnsupportedType { mime_type: String },

    #[error("File too large: {size} bytes (max: {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Draft not found: {0}")]
    DraftNotFound(String),

    #[error("Draft {0} is owned by another user")]
    NotOwned(String),

    #[error("Group mismatch: {0}")]
    WrongGroup(String),

    #[error("Draft already holds {max} media items")]
    QuotaExceeded { max: usize },

    #[error("Order must be a permutation of the draft's media: {0}")]
    OrderMismatch(String),

    #[error("Upload session not found: {0}")]
    SessionNotFound(String),

    #[error("Upload session expired: {0}")]
    SessionExpired(String),

    #[error("Upload session already finalized: {0}")]
    SessionAlreadyFinalized(String),

    #[error("Uploaded object missing: {0}")]
    ObjectMissing(String),

    #[error("Draft {0} is already being published")]
    PublishInProgress(String),

    #[error("Post has no content")]
    EmptyPost,

    #[error("Media not ready: {pending} pending, {failed} failed")]
    MediaNotReady { pending: usize, failed: usize },

    #[error("Draft {draft_id} is {status} and cannot be edited")]
    DraftNotEditable { draft_id: String, status: String },

    #[error("An editing draft already exists for this user and group")]
    ActiveDraftExists,

    #[error("Media not found: {0}")]
    MediaNotFound(String),

    #[error("Post not found: {0}")]
    PostNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Integrity error: {0}")]
    Integrity(String),
}

impl DraftError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnsupportedType { .. }
            | Self::FileTooLarge { .. }
            | Self::EmptyPost
            | Self::InvalidInput(_) => ErrorClass::Validation,
            Self::NotOwned(_) | Self::WrongGroup(_) => ErrorClass::Authorization,
            Self::DraftNotFound(_)
            | Self::SessionNotFound(_)
            | Self::MediaNotFound(_)
            | Self::PostNotFound(_) => ErrorClass::NotFound,
            Self::SessionExpired(_)
            | Self::SessionAlreadyFinalized(_)
            | Self::QuotaExceeded { .. }
            | Self::OrderMismatch(_)
            | Self::PublishInProgress(_)
            | Self::MediaNotReady { .. }
            | Self::DraftNotEditable { .. }
            | Self::ActiveDraftExists => ErrorClass::Conflict,
            Self::Storage(_) => ErrorClass::Transient,
            Self::ObjectMissing(_) | Self::Integrity(_) => ErrorClass::Integrity,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::DraftNotFound(_) => "draft_not_found",
            Self::NotOwned(_) => "not_owned",
            Self::WrongGroup(_) => "wrong_group",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::OrderMismatch(_) => "order_mismatch",
            Self::SessionNotFound(_) => "session_not_found",
            Self::SessionExpired(_) => "session_expired",
            Self::SessionAlreadyFinalized(_) => "session_already_finalized",
            Self::ObjectMissing(_) => "object_missing",
            Self::PublishInProgress(_) => "publish_in_progress",
            Self::EmptyPost => "empty_post",
            Self::MediaNotReady { .. } => "media_not_ready",
            Self::DraftNotEditable { .. } => "draft_not_editable",
            Self::ActiveDraftExists => "active_draft_exists",
            Self::MediaNotFound(_) => "media_not_found",
            Self::PostNotFound(_) => "post_not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Storage(_) => "storage",
            Self::Integrity(_) => "integrity",
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedType { .. } => ErrorKind::UnsupportedMediaType,
            Self::FileTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::SessionExpired(_) => ErrorKind::Gone,
            Self::ObjectMissing(_) => ErrorKind::Conflict,
            Self::OrderMismatch(_) | Self::QuotaExceeded { .. } | Self::EmptyPost => {
                ErrorKind::Unprocessable
            }
            Self::InvalidInput(_) => ErrorKind::BadRequest,
            _ => match self.class() {
                ErrorClass::Validation => ErrorKind::BadRequest,
                ErrorClass::Authorization => ErrorKind::Forbidden,
                ErrorClass::NotFound => ErrorKind::NotFound,
                ErrorClass::Conflict => ErrorKind::Conflict,
                ErrorClass::Transient => ErrorKind::Unavailable,
                ErrorClass::Integrity => ErrorKind::GeneralError,
            },
        }
    }
}

impl From<BlobError> for DraftError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound { key } => Self::ObjectMissing(key),
            BlobError::Invalid { message } => Self::InvalidInput(message),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<DraftError> for QuillError {
    fn from(err: DraftError) -> Self {
        let data = json!({
            "code": err.code(),
            "class": err.class().name(),
            "retryable": err.is_retryable(),
        });
        QuillError::new(err.kind(), err.to_string()).with_data(data)
    }
}
