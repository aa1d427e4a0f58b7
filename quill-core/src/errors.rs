//! # Errors
//!
//! Quill carries a Feathers-style structured error across crate boundaries.
//! It has a status code and class name, travels inside `anyhow::Error`, and
//! leaves serialization to the transport crate.
//!
//! Domain crates keep their own `thiserror` enums and convert into
//! [`QuillError`] at the edge, putting the stable machine code in `data`.

use std::fmt;

use anyhow::Error as AnyError;
use serde_json::{json, Value};

/// Transport-level error kinds the drafts surface can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    NotAuthenticated,
    Forbidden,
    NotFound,
    Conflict,
    Gone,
    PayloadTooLarge,
    UnsupportedMediaType,
    Unprocessable,
    GeneralError,
    Unavailable,
}

impl ErrorKind {
    /// (status, name, className)
    const fn meta(self) -> (u16, &'static str, &'static str) {
        match self {
            Self::BadRequest => (400, "BadRequest", "bad-request"),
            Self::NotAuthenticated => (401, "NotAuthenticated", "not-authenticated"),
            Self::Forbidden => (403, "Forbidden", "forbidden"),
            Self::NotFound => (404, "NotFound", "not-found"),
            Self::Conflict => (409, "Conflict", "conflict"),
            Self::Gone => (410, "Gone", "gone"),
            Self::PayloadTooLarge => (413, "PayloadTooLarge", "payload-too-large"),
            Self::UnsupportedMediaType => {
                (415, "UnsupportedMediaType", "unsupported-media-type")
            }
            Self::Unprocessable => (422, "Unprocessable", "unprocessable"),
            Self::GeneralError => (500, "GeneralError", "general-error"),
            Self::Unavailable => (503, "Unavailable", "unavailable"),
        }
    }

    pub fn status_code(self) -> u16 {
        self.meta().0
    }

    pub fn name(self) -> &'static str {
        self.meta().1
    }

    /// Kebab-cased class, e.g. `payload-too-large`
    pub fn class_name(self) -> &'static str {
        self.meta().2
    }

    pub fn is_server_error(self) -> bool {
        self.status_code() >= 500
    }
}

/// A structured error that can live inside `anyhow::Error`.
///
/// `data` holds machine-readable detail (the domain code, class and retry
/// hint); `errors` holds per-field validation messages.
#[derive(Debug)]
pub struct QuillError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<Value>,
    pub errors: Option<Value>,
}

macro_rules! kind_ctors {
    ($($ctor:ident => $kind:ident),* $(,)?) => {
        $(
            pub fn $ctor(msg: impl Into<String>) -> Self {
                Self::new(ErrorKind::$kind, msg)
            }
        )*
    };
}

impl QuillError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            errors: None,
        }
    }

    kind_ctors! {
        bad_request => BadRequest,
        not_authenticated => NotAuthenticated,
        forbidden => Forbidden,
        not_found => NotFound,
        conflict => Conflict,
        gone => Gone,
        payload_too_large => PayloadTooLarge,
        unsupported_media_type => UnsupportedMediaType,
        unprocessable => Unprocessable,
        general_error => GeneralError,
        unavailable => Unavailable,
    }

    pub fn with_data(self, data: Value) -> Self {
        Self {
            data: Some(data),
            ..self
        }
    }

    pub fn with_errors(self, errors: Value) -> Self {
        Self {
            errors: Some(errors),
            ..self
        }
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Find a `QuillError` anywhere in an `anyhow` chain.
    pub fn find_in(err: &AnyError) -> Option<&QuillError> {
        err.chain().find_map(|e| e.downcast_ref::<QuillError>())
    }

    /// Client-facing copy. Server-side failures without `data` lose their
    /// message so internals never reach a client.
    pub fn sanitize_for_client(&self) -> QuillError {
        let message = if self.kind.is_server_error() && self.data.is_none() {
            "Internal error".to_string()
        } else {
            self.message.clone()
        };
        QuillError {
            kind: self.kind,
            message,
            data: self.data.clone(),
            errors: self.errors.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
        });
        if let Some(data) = &self.data {
            body["data"] = data.clone();
        }
        if let Some(errors) = &self.errors {
            body["errors"] = errors.clone();
        }
        body
    }
}

impl fmt::Display for QuillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for QuillError {}
