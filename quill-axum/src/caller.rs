use axum::{extract::FromRequestParts, http::request::Parts};
use quill_core::{GroupId, GroupScope, QuillError, UserId};

use crate::QuillAxumError;

pub const USER_HEADER: &str = "x-user-id";

/// Authenticated caller, read from the `x-user-id` header set by the gateway
#[derive(Debug, Clone)]
pub struct Caller(pub UserId);

impl Caller {
    pub fn in_group(&self, group: String) -> GroupScope {
        GroupScope {
            owner: self.0.clone(),
            group: GroupId::new(group),
        }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = QuillAxumError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| QuillError::not_authenticated("Missing x-user-id header"))?;

        Ok(Caller(UserId::new(user)))
    }
}
