//! Media store abstraction
//!
//! This module defines the error taxonomy of the storage core and the
//! `MediaStore` trait that request handlers depend on.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use platter_core::{AppError, FileUploadResult, ManagedRoots, UploadTarget, ValidationError};
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Confinement violation, or a reference that did not resolve at all.
    #[error("Path escapes managed roots: {0}")]
    PathEscape(String),

    #[error("No files to archive")]
    NoFilesToArchive,

    #[error("Too many files to archive: {count} (max: {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Not a zip file: {}", .0.display())]
    NotAZipFile(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Archive failed: {0}")]
    ArchiveFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// True for errors caused by the request rather than the host.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            StorageError::IoError(_) | StorageError::ArchiveFailed(_) | StorageError::ConfigError(_)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte source of an incoming upload.
pub type UploadReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Chunked contents of a stored file.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Validation(e) => AppError::from(e),
            StorageError::PathEscape(_) | StorageError::FileNotFound(_) => {
                AppError::NotFound("File not found".to_string())
            }
            StorageError::NoFilesToArchive => AppError::BadRequest(err.to_string()),
            StorageError::TooManyFiles { .. } => AppError::LimitExceeded(err.to_string()),
            StorageError::NotAZipFile(_) => {
                AppError::BadRequest("Only .zip archives can be deleted".to_string())
            }
            StorageError::IoError(_)
            | StorageError::ArchiveFailed(_)
            | StorageError::ConfigError(_) => AppError::Storage(err.to_string()),
        }
    }
}

/// Media store abstraction
///
/// Handlers persist the string returned by [`MediaStore::to_stored_path`] and
/// hand it back to the other methods later; they never join paths themselves.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Validate and persist one uploaded file for `target`.
    ///
    /// The target selects the upload policy (audio for tracks, cover art for
    /// albums) and the generated filename.
    async fn save_upload(
        &self,
        reader: UploadReader,
        original_filename: &str,
        declared_size: u64,
        target: &UploadTarget,
    ) -> StorageResult<FileUploadResult>;

    /// Resolve a stored reference to a canonical absolute path.
    async fn resolve_stored_path(&self, reference: &str) -> StorageResult<PathBuf>;

    /// Convert an absolute path under the upload root to a stored reference.
    async fn to_stored_path(&self, absolute: &Path) -> StorageResult<String>;

    /// Delete a stored file given either its reference or its absolute path.
    ///
    /// An empty path or a file that is already gone is a successful no-op.
    async fn delete_stored_file(&self, path: &str) -> StorageResult<()>;

    /// Size in bytes of a stored file.
    async fn stored_file_size(&self, reference: &str) -> StorageResult<u64>;

    /// Open a stored file for streaming; returns its length and contents.
    async fn open_stream(&self, reference: &str) -> StorageResult<(u64, ByteStream)>;

    fn managed_roots(&self) -> &ManagedRoots;
}
