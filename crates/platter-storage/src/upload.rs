//! Upload pipeline: validate, name and persist one uploaded file.

use std::io;
use std::path::Path;
use std::time::Instant;

use platter_core::constants::{DIR_PERMISSIONS, FILE_PERMISSIONS};
use platter_core::{
    Config, FileUploadResult, ManagedRoots, UploadKind, UploadPolicy, UploadTarget,
    ValidationError,
};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::keys;
use crate::traits::{StorageResult, UploadReader};

/// Persists uploads under the managed roots.
///
/// Nothing is written until the extension, declared size and target have been
/// validated. Once the destination file exists, any failure removes it before
/// the error is returned.
#[derive(Debug, Clone)]
pub struct UploadPipeline {
    roots: ManagedRoots,
    audio_policy: UploadPolicy,
    cover_art_policy: UploadPolicy,
}

impl UploadPipeline {
    pub fn new(roots: ManagedRoots, audio_policy: UploadPolicy, cover_art_policy: UploadPolicy) -> Self {
        Self {
            roots,
            audio_policy,
            cover_art_policy,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.managed_roots(),
            config.audio_policy(),
            config.cover_art_policy(),
        )
    }

    pub fn policy_for(&self, kind: UploadKind) -> &UploadPolicy {
        match kind {
            UploadKind::Audio => &self.audio_policy,
            UploadKind::CoverArt => &self.cover_art_policy,
        }
    }

    #[tracing::instrument(
        skip(self, reader, target),
        fields(kind = %target.kind(), album_id = target.album_id())
    )]
    pub async fn save(
        &self,
        reader: UploadReader,
        original_filename: &str,
        declared_size: u64,
        target: &UploadTarget,
    ) -> StorageResult<FileUploadResult> {
        let policy = self.policy_for(target.kind());

        let extension = policy
            .validate(original_filename, declared_size)
            .and_then(|ext| target.validate().map(|_| ext))
            .map_err(|e| {
                tracing::debug!(
                    original_filename = %original_filename,
                    declared_size = declared_size,
                    error = %e,
                    "Upload rejected"
                );
                e
            })?;

        let filename = keys::target_filename(target, &extension);
        let dir = self.roots.root_for(target.kind());
        ensure_dir(dir).await.map_err(|e| {
            tracing::error!(dir = %dir.display(), error = %e, "Failed to create upload directory");
            e
        })?;

        let path = dir.join(&filename);
        let start = Instant::now();

        let mut file = create_destination(&path).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to create upload file");
            e
        })?;

        match write_contents(&path, &mut file, reader, policy.max_size()).await {
            Ok(size) => {
                tracing::info!(
                    path = %path.display(),
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Upload stored"
                );
                Ok(FileUploadResult {
                    path,
                    filename,
                    size,
                })
            }
            Err(e) => {
                drop(file);
                remove_partial(&path).await;
                Err(e)
            }
        }
    }
}

/// Create `dir` and its parents with directory permissions. Idempotent.
pub(crate) async fn ensure_dir(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIR_PERMISSIONS);
    builder.create(dir).await
}

async fn create_destination(path: &Path) -> io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(FILE_PERMISSIONS);
    options.open(path).await
}

/// Apply permissions explicitly (the open mode is subject to umask), then copy
/// at most `max_size + 1` bytes so an understated declared size cannot fill
/// the disk.
async fn write_contents(
    path: &Path,
    file: &mut fs::File,
    reader: UploadReader,
    max_size: u64,
) -> StorageResult<u64> {
    set_file_permissions(path).await?;

    let mut limited = reader.take(max_size.saturating_add(1));
    let written = tokio::io::copy(&mut limited, file).await?;
    if written > max_size {
        tracing::debug!(
            path = %path.display(),
            written = written,
            max_size = max_size,
            "Upload exceeded size ceiling during copy"
        );
        return Err(ValidationError::FileTooLarge {
            size: written,
            max: max_size,
        }
        .into());
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

#[cfg(unix)]
async fn set_file_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(FILE_PERMISSIONS)).await
}

#[cfg(not(unix))]
async fn set_file_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

async fn remove_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial upload"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to remove partial upload")
        }
    }
}
