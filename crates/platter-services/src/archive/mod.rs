//! ZIP archives of stored files.

pub mod builder;
pub mod service;

pub use builder::{normalize_archive_name, ArchiveBuilder};
pub use service::ArchiveService;
