//! Platter Storage Library
//!
//! Safe placement of uploaded media under the managed roots.
//!
//! # Stored file references
//!
//! Records persist paths relative to the general upload root, e.g.
//! `audio/7_03_My_Song.flac` or `covers/7_1a2b3c4d.png`. Every reference is
//! resolved through [`PathGuard`] before any read or delete, which
//! canonicalizes (following symlinks) and proves confinement by path segment.
//!
//! Filename generation is centralized in the `keys` module so naming stays
//! consistent across upload kinds.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod manifest;
pub mod paths;
pub mod sanitize;
pub mod traits;
pub mod upload;

pub use factory::create_media_store;
#[cfg(feature = "storage-local")]
pub use local::LocalMediaStore;
pub use manifest::build_manifest;
pub use paths::PathGuard;
pub use sanitize::{random_hex_suffix, sanitize_name};
pub use traits::{ByteStream, MediaStore, StorageError, StorageResult, UploadReader};
pub use upload::UploadPipeline;
