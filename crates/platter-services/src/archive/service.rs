use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use platter_core::Config;
use platter_storage::{PathGuard, StorageError, StorageResult};

use super::builder::ArchiveBuilder;

/// Async facade over [`ArchiveBuilder`] for request handlers.
///
/// Archives are written directly under the upload root and are transient:
/// [`ArchiveService::serve_archive`] deletes the archive once the caller has
/// sent it, whatever the outcome of the send.
#[derive(Clone)]
pub struct ArchiveService {
    builder: Arc<ArchiveBuilder>,
    guard: PathGuard,
}

fn has_zip_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

impl ArchiveService {
    pub fn new(builder: ArchiveBuilder) -> Self {
        let guard = PathGuard::new(builder.output_dir(), std::iter::empty::<PathBuf>());
        Self {
            builder: Arc::new(builder),
            guard,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ArchiveBuilder::new(config.upload_dir()))
    }

    /// Build an archive on the blocking pool and return its absolute path.
    #[tracing::instrument(skip(self, files), fields(file_count = files.len()))]
    pub async fn build_archive(
        &self,
        files: Vec<PathBuf>,
        desired_name: &str,
    ) -> StorageResult<PathBuf> {
        let builder = Arc::clone(&self.builder);
        let name = desired_name.to_string();
        let start = Instant::now();

        let path = tokio::task::spawn_blocking(move || builder.build(&files, &name))
            .await
            .map_err(|e| StorageError::ArchiveFailed(format!("Archive task failed: {}", e)))?
            .map_err(|e| {
                if e.is_client_error() {
                    tracing::debug!(error = %e, "Archive request rejected");
                } else {
                    tracing::error!(error = %e, "Archive build failed");
                }
                e
            })?;

        tracing::info!(
            path = %path.display(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Archive created"
        );

        Ok(path)
    }

    /// Delete an archive. Only `.zip` paths under the upload root are
    /// accepted; an archive that is already gone is a no-op.
    pub async fn delete_archive(&self, path: &Path) -> StorageResult<()> {
        if !has_zip_extension(path) {
            tracing::warn!(path = %path.display(), "Refusing to delete non-zip file as archive");
            return Err(StorageError::NotAZipFile(path.to_path_buf()));
        }

        if tokio::fs::symlink_metadata(path).await.is_err() {
            return Ok(());
        }

        // Remove the named entry; a `.zip` symlink never takes its target with it.
        let entry = self.guard.validate_entry(path)?;
        match tokio::fs::remove_file(&entry).await {
            Ok(()) => {
                tracing::info!(path = %entry.display(), "Archive deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::error!(path = %entry.display(), error = %e, "Failed to delete archive");
                Err(e.into())
            }
        }
    }

    /// Build an archive, hand its path to `send`, then delete it.
    ///
    /// The archive is removed whether `send` succeeds or fails; a failed
    /// delete is logged and left to the stale archive sweep.
    pub async fn serve_archive<F, Fut, T, E>(
        &self,
        files: Vec<PathBuf>,
        desired_name: &str,
        send: F,
    ) -> Result<T, E>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<StorageError>,
    {
        let path = self.build_archive(files, desired_name).await?;
        let result = send(path.clone()).await;

        if let Err(e) = self.delete_archive(&path).await {
            tracing::error!(path = %path.display(), error = %e, "Failed to clean up served archive");
        }

        result
    }
}
