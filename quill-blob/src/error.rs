use thiserror::Error;

/// Result alias for blob store calls
pub type BlobResult<T> = Result<T, BlobError>;

/// Failures surfaced by a [`crate::BlobStore`] or a signed write
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("No object at {key}")]
    NotFound { key: String },

    #[error("Rejected blob request: {message}")]
    Invalid { message: String },

    #[error("Write target has expired")]
    SignatureExpired,

    #[error("Write target rejected: {reason}")]
    SignatureInvalid { reason: String },

    #[error("Blob backend failure: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BlobError {
    /// Wrap an SDK or transport failure
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn signature_invalid<S: Into<String>>(reason: S) -> Self {
        Self::SignatureInvalid {
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
