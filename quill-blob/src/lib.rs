//! # quill-blob: storage seam for staged direct uploads
//!
//! Large payloads never transit the orchestrating tier. The coordinator asks a
//! [`SignedUrlBlobStore`] for a short-lived write target, the client writes the
//! bytes straight to it, and the coordinator later verifies the object with
//! [`BlobStore::head`].
//!
//! ```rust
//! use quill_blob::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let store = MemoryBlobStore::new("memory://blobs");
//! let key = DefaultKeyStrategy.upload_key("group-1", "draft-1", "upl_1", "cat.png");
//!
//! let target = store.sign_put(&key, Some("image/png"), 900).await?;
//! store.write_signed(&target.url, Some("image/png"), bytes::Bytes::from_static(b"png"))?;
//!
//! assert_eq!(store.head(&key).await?.size_bytes, 3);
//! # Ok(())
//! # }
//! ```
//!
//! Backends:
//! - [`MemoryBlobStore`] for tests and the dev server
//! - `S3CompatibleStore` behind the `s3` feature

mod error;
mod memory_store;
#[cfg(feature = "s3")]
mod s3_store;
pub mod store;
mod types;

pub use error::{BlobError, BlobResult};
pub use memory_store::MemoryBlobStore;
#[cfg(feature = "s3")]
pub use s3_store::{S3CompatibleStore, S3Config};
pub use store::{
    BlobKeyStrategy, BlobStore, DefaultKeyStrategy, ObjectHead, PutResult, SignedUrlBlobStore,
};
pub use types::SignedTarget;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobError, BlobKeyStrategy, BlobResult, BlobStore, DefaultKeyStrategy,
        MemoryBlobStore, SignedTarget, SignedUrlBlobStore,
    };
}
