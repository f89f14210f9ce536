//! Synchronous ZIP construction.
//!
//! Runs on a blocking thread; see [`crate::archive::ArchiveService`] for the
//! async entry point.

use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use platter_core::constants::{FILE_PERMISSIONS, MAX_ARCHIVE_FILES};
use platter_core::ValidationError;
use platter_storage::{random_hex_suffix, sanitize_name, StorageError, StorageResult};
use zip::result::ZipError;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

/// Builds one archive from a bounded list of existing files.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    output_dir: PathBuf,
    max_files: usize,
}

/// Sanitize a caller-supplied archive name and ensure a `.zip` suffix
/// (case-insensitive).
pub fn normalize_archive_name(desired_name: &str) -> Result<String, ValidationError> {
    let mut name = sanitize_name(desired_name.trim());
    if name.chars().all(|c| c == '.') || name.eq_ignore_ascii_case(".zip") {
        return Err(ValidationError::invalid(
            "archive_name",
            "must contain a usable file name",
        ));
    }
    if !name.to_lowercase().ends_with(".zip") {
        name.push_str(".zip");
    }
    Ok(name)
}

/// Name of the in-progress file for archive `name`. Hidden, unique per build,
/// and never ends in `.zip`, so a reader of the final name never sees it.
fn temp_archive_name(name: &str) -> String {
    format!(".{}.{}.tmp", name, random_hex_suffix())
}

/// Removes this build's temporary file on drop unless committed.
struct PendingArchive {
    path: PathBuf,
    committed: bool,
}

impl PendingArchive {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingArchive {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed incomplete archive"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove incomplete archive"
            ),
        }
    }
}

fn zip_error(err: ZipError) -> StorageError {
    match err {
        ZipError::Io(e) => StorageError::IoError(e),
        other => StorageError::ArchiveFailed(other.to_string()),
    }
}

#[cfg(unix)]
fn entry_permissions(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn entry_permissions(_metadata: &Metadata) -> u32 {
    FILE_PERMISSIONS
}

fn entry_options(metadata: &Metadata) -> FileOptions {
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(entry_permissions(metadata))
        .large_file(metadata.len() >= u64::from(u32::MAX));

    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| zip::DateTime::try_from(time::OffsetDateTime::from(t)).ok());

    match modified {
        Some(t) => options.last_modified_time(t),
        None => options,
    }
}

fn create_archive_file(path: &Path) -> io::Result<File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_PERMISSIONS);
    }
    options.open(path)
}

impl ArchiveBuilder {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_files: MAX_ARCHIVE_FILES,
        }
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `files` into `{output_dir}/{desired_name}.zip`.
    ///
    /// Each input becomes one deflated entry named by its base filename. The
    /// archive is written under a temporary name and renamed into place once
    /// complete; any failure removes only that temporary file.
    pub fn build(&self, files: &[PathBuf], desired_name: &str) -> StorageResult<PathBuf> {
        if files.is_empty() {
            return Err(StorageError::NoFilesToArchive);
        }
        if files.len() > self.max_files {
            return Err(StorageError::TooManyFiles {
                count: files.len(),
                max: self.max_files,
            });
        }

        let name = normalize_archive_name(desired_name)?;
        let path = self.output_dir.join(&name);
        let temp_path = self.output_dir.join(temp_archive_name(&name));

        let file = create_archive_file(&temp_path)?;
        let pending = PendingArchive {
            path: temp_path.clone(),
            committed: false,
        };

        let mut zip = ZipWriter::new(file);
        for input in files {
            append_entry(&mut zip, input)?;
        }

        let file = zip.finish().map_err(zip_error)?;
        file.sync_all()?;
        drop(file);

        // Replaces an earlier archive of the same name; open readers keep theirs.
        fs::rename(&temp_path, &path)?;
        pending.commit();

        Ok(path)
    }
}

fn append_entry(zip: &mut ZipWriter<File>, input: &Path) -> StorageResult<()> {
    if !input.is_file() {
        tracing::debug!(path = %input.display(), "Archive input missing");
        return Err(StorageError::FileNotFound(input.to_path_buf()));
    }

    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            StorageError::ArchiveFailed(format!("unusable file name: {}", input.display()))
        })?;

    let mut source = File::open(input).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => StorageError::FileNotFound(input.to_path_buf()),
        _ => StorageError::IoError(e),
    })?;
    let metadata = source.metadata()?;

    zip.start_file(name, entry_options(&metadata))
        .map_err(zip_error)?;
    io::copy(&mut source, zip)?;

    Ok(())
}
