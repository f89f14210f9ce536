use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use platter_core::Config;
use tokio::time::interval;

/// Removes archives left directly under the upload root by a request that
/// died between building and deleting them.
#[derive(Clone)]
pub struct ArchiveSweeper {
    upload_dir: PathBuf,
    max_age: Duration,
}

/// Finished archives (`*.zip`) and the hidden temporary files of builds that
/// never completed (`.{name}.zip.{hex}.tmp`).
fn is_archive(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".zip")
        || (lower.starts_with('.') && lower.ends_with(".tmp") && lower.contains(".zip."))
}

impl ArchiveSweeper {
    pub fn new(upload_dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_age,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.upload_dir(),
            Duration::from_secs(config.archive_max_age_secs),
        )
    }

    /// Start a background sweep that runs every hour, first tick immediately.
    ///
    /// Nothing in the storage core calls this; the host service spawns it at
    /// startup and owns the returned handle (abort it on shutdown). The CLI
    /// runs a single [`ArchiveSweeper::sweep`] instead.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(Duration::from_secs(3600)); // 1 hour

            loop {
                sweep_interval.tick().await;

                tracing::info!("Starting scheduled sweep of stale archives");

                if let Err(e) = self.sweep().await {
                    tracing::error!(error = %e, "Archive sweep failed");
                }
            }
        })
    }

    /// Delete archives and leftover archive temp files under the upload root
    /// older than the configured age. Subdirectories are not visited. Returns
    /// the number removed.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "stale_archives"))]
    pub async fn sweep(&self) -> Result<usize, anyhow::Error> {
        let cutoff: DateTime<Utc> = Utc::now() - chrono::Duration::from_std(self.max_age)?;
        let mut entries = tokio::fs::read_dir(&self.upload_dir).await?;
        let mut deleted = 0usize;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_archive(&path) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to read archive metadata");
                    continue;
                }
            };

            let modified: DateTime<Utc> = match metadata.modified() {
                Ok(t) => t.into(),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Archive has no modification time");
                    continue;
                }
            };
            if modified >= cutoff {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    deleted += 1;
                    tracing::info!(
                        path = %path.display(),
                        modified = %modified,
                        "Deleted stale archive"
                    );
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to delete stale archive");
                }
            }
        }

        tracing::info!(deleted, "Stale archive sweep completed");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use tempfile::tempdir;

    fn age(path: &Path, by: Duration) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[tokio::test]
    async fn test_sweep_removes_only_stale_archives() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("album_1.zip");
        let fresh = dir.path().join("album_2.zip");
        let old_track = dir.path().join("old.flac");
        for path in [&stale, &fresh, &old_track] {
            std::fs::write(path, b"data").unwrap();
        }
        age(&stale, Duration::from_secs(7200));
        age(&old_track, Duration::from_secs(7200));

        let sweeper = ArchiveSweeper::new(dir.path(), Duration::from_secs(3600));
        assert_eq!(sweeper.sweep().await.unwrap(), 1);

        assert!(!stale.exists());
        assert!(fresh.exists());
        assert!(old_track.exists());
    }

    #[tokio::test]
    async fn test_sweep_removes_stale_temp_archives() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join(".album_1.zip.1a2b3c4d.tmp");
        let other_tmp = dir.path().join("upload.tmp");
        std::fs::write(&temp, b"PK").unwrap();
        std::fs::write(&other_tmp, b"x").unwrap();
        age(&temp, Duration::from_secs(7200));
        age(&other_tmp, Duration::from_secs(7200));

        let sweeper = ArchiveSweeper::new(dir.path(), Duration::from_secs(3600));
        assert_eq!(sweeper.sweep().await.unwrap(), 1);
        assert!(!temp.exists());
        assert!(other_tmp.exists());
    }

    #[tokio::test]
    async fn test_start_sweeps_on_first_tick() {
        let dir = tempdir().unwrap();
        let stale = dir.path().join("album_3.zip");
        std::fs::write(&stale, b"PK").unwrap();
        age(&stale, Duration::from_secs(7200));

        let sweeper = ArchiveSweeper::new(dir.path(), Duration::from_secs(3600));
        let handle = Arc::new(sweeper).start();
        for _ in 0..100 {
            if !stale.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();

        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_sweep_skips_subdirectories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("audio");
        std::fs::create_dir_all(&nested).unwrap();
        let nested_zip = nested.join("keep.zip");
        std::fs::write(&nested_zip, b"PK").unwrap();
        age(&nested_zip, Duration::from_secs(7200));

        let sweeper = ArchiveSweeper::new(dir.path(), Duration::from_secs(60));
        assert_eq!(sweeper.sweep().await.unwrap(), 0);
        assert!(nested_zip.exists());
    }

    #[tokio::test]
    async fn test_sweep_missing_root_is_error() {
        let dir = tempdir().unwrap();
        let sweeper = ArchiveSweeper::new(dir.path().join("missing"), Duration::from_secs(60));
        assert!(sweeper.sweep().await.is_err());
    }
}
