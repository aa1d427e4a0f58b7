//! # quill-drafts
//!
//! Draft lifecycle, staged media uploads and atomic publish for group
//! discussions.
//!
//! A caller obtains its draft for a group ([`DraftStore::create_or_get`]),
//! attaches files through the [`UploadCoordinator`] (initiate, write the bytes
//! straight to the signed target, finalize), arranges them with the
//! [`MediaLedger`], and finally calls [`PublishCoordinator::publish`], which
//! turns the draft and its ledger into an immutable post in one step.
//!
//! ```rust
//! use quill_blob::MemoryBlobStore;
//! use quill_core::GroupScope;
//! use quill_drafts::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> DraftResult<()> {
//! let blobs = MemoryBlobStore::new("memory://blobs");
//! let drafts = DraftsAdapter::new(MemoryDraftBackend::new(), blobs.clone(), DraftsConfig::default());
//!
//! let scope = GroupScope::new("user-1", "group-1");
//! let view = drafts.drafts.create_or_get(&scope).await?;
//!
//! let ticket = drafts
//!     .uploads
//!     .initiate(&scope.owner, UploadRequest::new(view.draft.id.clone(), "cat.png", "image/png", 3))
//!     .await?;
//! blobs.write_signed(&ticket.upload_url, Some("image/png"), bytes::Bytes::from_static(b"png"))?;
//! drafts.uploads.finalize(&scope.owner, &ticket.upload_id).await?;
//!
//! let post_id = drafts
//!     .publisher
//!     .publish(&scope.owner, &view.draft.id, Visibility::Public)
//!     .await?;
//! let post = drafts.publisher.get_post(&scope.group, &post_id).await?;
//! assert_eq!(post.media.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! Group scoping is enforced inside each service: reads filter on the stored
//! group, uploads are bound to the draft's group at initiate time, and a
//! draft cannot change group once media is attached.

pub mod adapter;
pub mod backend;
pub mod config;
pub mod drafts;
pub mod error;
pub mod ledger;
pub mod publish;
pub mod reaper;
pub mod types;
pub mod uploads;

pub use adapter::DraftsAdapter;
pub use backend::{DraftBackend, FaultPoint, MemoryDraftBackend, RemovedDraft, VerifiedObject};
pub use config::DraftsConfig;
pub use drafts::DraftStore;
pub use error::{DraftError, DraftResult, ErrorClass};
pub use ledger::{is_contiguous, MediaLedger};
pub use publish::{ensure_publishable, PublishCoordinator};
pub use reaper::{ReapReport, SessionReaper};
pub use types::*;
pub use uploads::UploadCoordinator;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        DraftError, DraftPatch, DraftResult, DraftView, DraftsAdapter, DraftsConfig,
        MemoryDraftBackend, UploadRequest, Visibility,
    };
}
