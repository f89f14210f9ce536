use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use platter_core::{Config, FileUploadResult, ManagedRoots, UploadPolicy, UploadTarget};
use tokio::fs;

use crate::paths::PathGuard;
use crate::traits::{ByteStream, MediaStore, StorageError, StorageResult, UploadReader};
use crate::upload::{ensure_dir, UploadPipeline};

/// Local filesystem media store
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    roots: ManagedRoots,
    guard: PathGuard,
    pipeline: UploadPipeline,
}

impl LocalMediaStore {
    /// Create a store from configuration, creating every managed root.
    pub async fn new(config: &Config) -> StorageResult<Self> {
        Self::with_policies(
            config.managed_roots(),
            config.audio_policy(),
            config.cover_art_policy(),
        )
        .await
    }

    pub async fn with_policies(
        roots: ManagedRoots,
        audio_policy: UploadPolicy,
        cover_art_policy: UploadPolicy,
    ) -> StorageResult<Self> {
        for root in roots.all() {
            ensure_dir(root).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    root.display(),
                    e
                ))
            })?;
        }

        Ok(LocalMediaStore {
            guard: PathGuard::from_roots(&roots),
            pipeline: UploadPipeline::new(roots.clone(), audio_policy, cover_art_policy),
            roots,
        })
    }

    pub fn path_guard(&self) -> &PathGuard {
        &self.guard
    }

    /// Interpret `path` as absolute if it is, otherwise relative to the upload root.
    fn candidate_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.roots.upload().join(path)
        }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn save_upload(
        &self,
        reader: UploadReader,
        original_filename: &str,
        declared_size: u64,
        target: &UploadTarget,
    ) -> StorageResult<FileUploadResult> {
        self.pipeline
            .save(reader, original_filename, declared_size, target)
            .await
    }

    async fn resolve_stored_path(&self, reference: &str) -> StorageResult<PathBuf> {
        self.guard.resolve_for_read(reference)
    }

    async fn to_stored_path(&self, absolute: &Path) -> StorageResult<String> {
        self.guard.to_relative(absolute)
    }

    async fn delete_stored_file(&self, path: &str) -> StorageResult<()> {
        if path.is_empty() {
            return Ok(());
        }

        let candidate = self.candidate_path(path);
        if fs::symlink_metadata(&candidate).await.is_err() {
            tracing::debug!(path = %candidate.display(), "Stored file already absent");
            return Ok(());
        }

        // A symlink is removed itself; its target is left alone.
        let entry = self.guard.validate_entry(&candidate)?;
        let start = Instant::now();

        match fs::remove_file(&entry).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                tracing::error!(path = %entry.display(), error = %e, "Failed to delete stored file");
                return Err(e.into());
            }
        }

        tracing::info!(
            path = %entry.display(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Stored file deleted"
        );

        Ok(())
    }

    async fn stored_file_size(&self, reference: &str) -> StorageResult<u64> {
        let path = self.guard.resolve_for_read(reference)?;
        Ok(fs::metadata(&path).await?.len())
    }

    async fn open_stream(&self, reference: &str) -> StorageResult<(u64, ByteStream)> {
        let path = self.guard.resolve_for_read(reference)?;
        let start = Instant::now();

        let file = fs::File::open(&path).await?;
        let len = file.metadata().await?.len();

        let path_display = path.display().to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(
                    path = %path_display,
                    error = %e,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Stored file stream error"
                );
                StorageError::IoError(e)
            })
        });

        Ok((len, Box::pin(stream)))
    }

    fn managed_roots(&self) -> &ManagedRoots {
        &self.roots
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn store(root: &Path) -> LocalMediaStore {
        LocalMediaStore::with_policies(
            ManagedRoots::under(root.join("uploads")),
            UploadPolicy::audio(1024),
            UploadPolicy::cover_art(1024),
        )
        .await
        .unwrap()
    }

    fn reader(data: &[u8]) -> UploadReader {
        Box::pin(std::io::Cursor::new(data.to_vec()))
    }

    #[tokio::test]
    async fn test_new_creates_roots() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;
        for root in store.managed_roots().all() {
            assert!(root.is_dir(), "{} should exist", root.display());
        }
    }

    #[tokio::test]
    async fn test_upload_reference_round_trip() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        let target = UploadTarget::CoverArt { album_id: 3 };
        let result = store
            .save_upload(reader(b"jpeg"), "cover.jpg", 4, &target)
            .await
            .unwrap();

        let reference = store.to_stored_path(&result.path).await.unwrap();
        assert!(reference.starts_with("covers/3_"));

        let resolved = store.resolve_stored_path(&reference).await.unwrap();
        assert_eq!(resolved, result.path.canonicalize().unwrap());
        assert_eq!(store.stored_file_size(&reference).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_open_stream() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        let target = UploadTarget::Track {
            album_id: 1,
            track_number: 1,
            title: "Intro".to_string(),
        };
        let result = store
            .save_upload(reader(b"stream download test"), "intro.wav", 20, &target)
            .await
            .unwrap();
        let reference = store.to_stored_path(&result.path).await.unwrap();

        let (len, mut stream) = store.open_stream(&reference).await.unwrap();
        let mut downloaded = Vec::new();
        while let Some(chunk) = stream.next().await {
            downloaded.extend_from_slice(&chunk.unwrap());
        }

        assert_eq!(len, 20);
        assert_eq!(downloaded, b"stream download test");
    }

    #[tokio::test]
    async fn test_delete_by_reference_and_absolute_path() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        let audio = store.managed_roots().audio().to_path_buf();
        std::fs::write(audio.join("a.flac"), b"a").unwrap();
        std::fs::write(audio.join("b.flac"), b"b").unwrap();

        store.delete_stored_file("audio/a.flac").await.unwrap();
        assert!(!audio.join("a.flac").exists());

        let absolute = audio.join("b.flac");
        store
            .delete_stored_file(absolute.to_str().unwrap())
            .await
            .unwrap();
        assert!(!absolute.exists());
    }

    #[tokio::test]
    async fn test_delete_absent_is_noop() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        assert!(store.delete_stored_file("").await.is_ok());
        assert!(store.delete_stored_file("audio/gone.flac").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_outside_roots_rejected() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        let outside = dir.path().join("keep.txt");
        std::fs::write(&outside, b"keep").unwrap();

        let err = store.delete_stored_file("../keep.txt").await.unwrap_err();
        assert!(matches!(err, StorageError::PathEscape(_)));

        let err = store
            .delete_stored_file(outside.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::PathEscape(_)));
        assert!(outside.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_delete_symlink_alias_keeps_target() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        let audio = store.managed_roots().audio().to_path_buf();
        let real = audio.join("7_01_Real.flac");
        let alias = audio.join("alias.flac");
        std::fs::write(&real, b"real").unwrap();
        std::os::unix::fs::symlink(&real, &alias).unwrap();

        store.delete_stored_file("audio/alias.flac").await.unwrap();

        assert!(real.exists());
        assert!(std::fs::symlink_metadata(&alias).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_delete_dangling_symlink() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        let link = store.managed_roots().audio().join("dangling.flac");
        std::os::unix::fs::symlink(dir.path().join("nowhere"), &link).unwrap();

        store.delete_stored_file("audio/dangling.flac").await.unwrap();
        assert!(std::fs::symlink_metadata(&link).is_err());
    }

    #[tokio::test]
    async fn test_resolve_dangling_reference() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        let result = store.resolve_stored_path("audio/missing.flac").await;
        assert!(matches!(result, Err(StorageError::PathEscape(_))));
    }
}
