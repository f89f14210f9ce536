//! Platter Services Layer
//!
//! Multi-step file operations built on the storage crate: on-demand ZIP
//! archives of stored files and the background sweep that removes archives
//! left behind by an interrupted request.

#[cfg(feature = "archive")]
pub mod archive;
#[cfg(feature = "cleanup")]
pub mod cleanup;

#[cfg(feature = "archive")]
pub use archive::{normalize_archive_name, ArchiveBuilder, ArchiveService};
#[cfg(feature = "cleanup")]
pub use cleanup::ArchiveSweeper;
pub use platter_storage::{StorageError, StorageResult};
