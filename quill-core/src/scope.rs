//! Caller and group scope types.
//!
//! Every operation is explicitly scoped: the authenticated caller is an
//! opaque [`UserId`] supplied by the identity layer, and group-scoped reads
//! take a [`GroupScope`] that is compared against the *stored* group of the
//! row being read.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque authenticated user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discussion group identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The (owner, group) pair a read or write is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupScope {
    pub owner: UserId,
    pub group: GroupId,
}

impl GroupScope {
    pub fn new<U: Into<String>, G: Into<String>>(owner: U, group: G) -> Self {
        Self {
            owner: UserId(owner.into()),
            group: GroupId(group.into()),
        }
    }

    /// True when a row owned by `owner` in `group` is visible in this scope.
    pub fn admits(&self, owner: &UserId, group: &GroupId) -> bool {
        &self.owner == owner && &self.group == group
    }
}
