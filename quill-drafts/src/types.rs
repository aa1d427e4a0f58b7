use chrono::{DateTime, Utc};
use quill_blob::SignedTarget;
use quill_core::{GroupId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a new random identifier
            pub fn new() -> Self {
                Self(format!(concat!($prefix, "_{}"), Uuid::new_v4().simple()))
            }

            pub fn from_string(id: String) -> Self {
                Self(id)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Unique identifier for a draft
    DraftId, "drf"
);
string_id!(
    /// Unique identifier for a draft media record
    MediaId, "med"
);
string_id!(
    /// Unique identifier for an upload session
    UploadId, "upl"
);
string_id!(
    /// Unique identifier for a published post
    PostId, "pst"
);
string_id!(
    /// Unique identifier for a post media record
    PostMediaId, "pmd"
);

/// Draft lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DraftStatus {
    /// Mutable; at most one per (owner, group)
    Editing,

    /// Locked by an in-flight publish
    Publishing { since: DateTime<Utc> },

    /// Deleted; only ever seen on the snapshot returned by discard
    Discarded { at: DateTime<Utc> },
}

impl DraftStatus {
    pub fn is_editing(&self) -> bool {
        matches!(self, Self::Editing)
    }

    pub fn is_publishing(&self) -> bool {
        matches!(self, Self::Publishing { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Editing => "editing",
            Self::Publishing { .. } => "publishing",
            Self::Discarded { .. } => "discarded",
        }
    }
}

/// Mentions, hashtags, poll and link-preview payloads.
///
/// Opaque to this crate apart from the poll/link-preview presence checks
/// used by publish validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftMetadata(pub Value);

impl Default for DraftMetadata {
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

impl DraftMetadata {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// JSON merge-patch: object keys overwrite, `null` removes a key,
    /// anything else replaces the whole value.
    pub fn merge(&mut self, patch: &Value) {
        merge_patch(&mut self.0, patch);
    }

    pub fn has_poll(&self) -> bool {
        self.present("poll")
    }

    pub fn has_link_preview(&self) -> bool {
        self.present("link_preview")
    }

    fn present(&self, key: &str) -> bool {
        match self.0.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::Object(map)) => !map.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }
}

fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Mutable staging area for an unpublished post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: DraftId,
    pub owner: UserId,
    pub group_id: GroupId,
    pub title: String,
    pub body: String,
    pub metadata: DraftMetadata,
    pub status: DraftStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    /// A fresh, empty draft in `Editing`
    pub fn new(owner: UserId, group_id: GroupId) -> Self {
        let now = Utc::now();
        Self {
            id: DraftId::new(),
            owner,
            group_id,
            title: String::new(),
            body: String::new(),
            metadata: DraftMetadata::default(),
            status: DraftStatus::Editing,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_text(&self) -> bool {
        !self.title.trim().is_empty() || !self.body.trim().is_empty()
    }
}

/// Partial update applied by `DraftStore::update`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    /// Merge-patch applied to the stored metadata
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Reassign the draft to another group; refused once media is attached
    #[serde(default)]
    pub group_id: Option<GroupId>,
}

impl DraftPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_body<S: Into<String>>(mut self, body: S) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }
}

/// Per-file upload state.
///
/// `Uploaded` always carries its url; there is no "completed without url".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MediaState {
    Pending { upload_id: UploadId },
    Uploaded { url: String, verified_at: DateTime<Utc> },
    Failed { reason: String, failed_at: DateTime<Utc> },
}

impl MediaState {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, Self::Uploaded { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending { .. } => "pending",
            Self::Uploaded { .. } => "uploaded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// One slot of a draft's media ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: MediaId,
    pub draft_id: DraftId,
    /// Inherited from the draft at creation; never changes
    pub group_id: GroupId,
    pub object_key: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub order_index: u32,
    pub state: MediaState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaRecord {
    pub fn url(&self) -> Option<&str> {
        match &self.state {
            MediaState::Uploaded { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// Upload session lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Initiated,
    Completed { completed_at: DateTime<Utc> },
    Expired { expired_at: DateTime<Utc> },
}

impl SessionStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Completed { .. } => "completed",
            Self::Expired { .. } => "expired",
        }
    }
}

/// Ephemeral record of one in-flight staged transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    pub id: UploadId,
    pub draft_id: DraftId,
    pub media_id: MediaId,
    pub owner: UserId,
    /// Group of the draft at initiate time
    pub group_id: GroupId,
    pub filename: String,
    pub mime_type: String,
    pub declared_size: u64,
    pub object_key: String,
    pub target: SignedTarget,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: SessionStatus,
}

impl UploadSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Audience of a published post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Members,
    Private,
}

/// Immutable published post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author: UserId,
    pub group_id: GroupId,
    pub title: String,
    pub body: String,
    pub metadata: DraftMetadata,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

/// Media attached to a post, order preserved from the source ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMediaRecord {
    pub id: PostMediaId,
    pub post_id: PostId,
    pub object_key: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub order_index: u32,
}

/// A post together with its complete media set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub post: Post,
    pub media: Vec<PostMediaRecord>,
}

/// A draft together with its ordered ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftView {
    pub draft: Draft,
    pub media: Vec<MediaRecord>,
}

/// Input to the initiate phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub draft_id: DraftId,
    pub filename: String,
    pub mime_type: String,
    pub declared_size: u64,
    /// Failed slot to reuse instead of appending a new one
    #[serde(default)]
    pub replace: Option<MediaId>,
}

impl UploadRequest {
    pub fn new<F: Into<String>, M: Into<String>>(
        draft_id: DraftId,
        filename: F,
        mime_type: M,
        declared_size: u64,
    ) -> Self {
        Self {
            draft_id,
            filename: filename.into(),
            mime_type: mime_type.into(),
            declared_size,
            replace: None,
        }
    }

    pub fn replacing(mut self, media_id: MediaId) -> Self {
        self.replace = Some(media_id);
        self
    }
}

/// Output of the initiate phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTicket {
    pub upload_id: UploadId,
    pub media_id: MediaId,
    pub order_index: u32,
    pub upload_url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub expires_at: DateTime<Utc>,
}

/// Output of the finalize phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedUpload {
    pub media_id: MediaId,
    pub url: String,
    pub mime_type: String,
    pub file_size: u64,
}
