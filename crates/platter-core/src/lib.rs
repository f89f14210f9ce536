//! Platter Core Library
//!
//! Configuration, error types, domain models and upload validation shared by
//! the storage, processing and service crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod validation;

pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    AudioFormat, AudioQuality, ChunkInfo, ChunkManifest, DownloadProgress, FileUploadResult,
    ManagedRoots, UploadKind, UploadPolicy, UploadTarget,
};
pub use validation::ValidationError;
