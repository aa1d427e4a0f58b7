//! quill-core: framework-agnostic primitives shared by the Quill crates.

pub mod config;
pub mod errors;
pub mod scope;

pub use config::{QuillConfig, QuillConfigSnapshot};
pub use errors::{ErrorKind, QuillError};
pub use scope::{GroupId, GroupScope, UserId};
