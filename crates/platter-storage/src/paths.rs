//! Path confinement for stored files.
//!
//! Every path is canonicalized (symlinks resolved) before it is compared with
//! the managed roots, and the comparison is by path component. A string prefix
//! check on unresolved paths would accept `/data/uploads-evil` for
//! `/data/uploads` and would miss symlinks that point outside the root.

use std::io;
use std::path::{Component, Path, PathBuf};

use platter_core::ManagedRoots;

use crate::traits::{StorageError, StorageResult};

/// Confines file access to a fixed set of root directories.
///
/// The primary root is the directory stored references are relative to.
#[derive(Debug, Clone)]
pub struct PathGuard {
    primary: PathBuf,
    roots: Vec<PathBuf>,
}

impl PathGuard {
    pub fn new(primary: impl Into<PathBuf>, others: impl IntoIterator<Item = PathBuf>) -> Self {
        let primary = primary.into();
        let mut roots = vec![primary.clone()];
        roots.extend(others);
        Self { primary, roots }
    }

    pub fn from_roots(roots: &ManagedRoots) -> Self {
        Self::new(
            roots.upload(),
            [roots.audio().to_path_buf(), roots.cover_art().to_path_buf()],
        )
    }

    pub fn primary_root(&self) -> &Path {
        &self.primary
    }

    /// Resolve a stored reference against the primary root.
    ///
    /// Absolute and root-anchored references are rejected before joining. A
    /// reference that does not resolve (missing file, broken symlink) is a
    /// `PathEscape`; callers report it as not found.
    pub fn resolve_for_read(&self, reference: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(reference);
        let anchored = relative
            .components()
            .any(|c| matches!(c, Component::RootDir | Component::Prefix(_)));
        if reference.is_empty() || anchored {
            tracing::warn!(reference = %reference, "Rejected non-relative stored reference");
            return Err(StorageError::PathEscape(reference.to_string()));
        }

        let canonical = canonicalize(&self.primary.join(relative))?;
        self.confine(&canonical)?;
        Ok(canonical)
    }

    /// Canonicalize `path` and require it to lie at or below a managed root.
    /// Returns the canonical path.
    pub fn validate_confinement(&self, path: &Path) -> StorageResult<PathBuf> {
        let canonical = canonicalize(path)?;
        self.confine(&canonical)?;
        Ok(canonical)
    }

    /// Confine the directory entry named by `path` rather than what it points
    /// to. The parent is canonicalized and the final component re-attached, so
    /// a symlink (even a dangling one) is checked by where it lives. Returns
    /// the entry path to operate on.
    pub fn validate_entry(&self, path: &Path) -> StorageResult<PathBuf> {
        let escape = || StorageError::PathEscape(path.display().to_string());
        let name = match path.components().next_back() {
            Some(Component::Normal(name)) => name,
            _ => return Err(escape()),
        };
        let parent = path.parent().ok_or_else(escape)?;
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };

        let entry = canonicalize(parent)?.join(name);
        self.confine(&entry)?;
        Ok(entry)
    }

    /// Express `path` relative to the primary root.
    ///
    /// The root itself has no stored form and is rejected, as is anything
    /// that resolves outside it.
    pub fn to_relative(&self, path: &Path) -> StorageResult<String> {
        let canonical = canonicalize(path)?;
        let root = canonicalize(&self.primary)?;

        let relative = match canonical.strip_prefix(&root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => {
                tracing::warn!(
                    path = %canonical.display(),
                    root = %root.display(),
                    "Path resolves outside upload root"
                );
                return Err(StorageError::PathEscape(path.display().to_string()));
            }
        };

        relative
            .to_str()
            .map(str::to_string)
            .ok_or_else(|| StorageError::PathEscape(path.display().to_string()))
    }

    fn confine(&self, canonical: &Path) -> StorageResult<()> {
        for root in &self.roots {
            match root.canonicalize() {
                Ok(root) if canonical.starts_with(&root) => return Ok(()),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(root = %root.display(), error = %e, "Skipping unresolvable root");
                }
            }
        }

        tracing::warn!(
            path = %canonical.display(),
            "Path escapes managed roots"
        );
        Err(StorageError::PathEscape(canonical.display().to_string()))
    }
}

fn canonicalize(path: &Path) -> StorageResult<PathBuf> {
    path.canonicalize().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            tracing::debug!(path = %path.display(), "Path does not resolve");
        } else {
            tracing::warn!(path = %path.display(), error = %e, "Failed to resolve path");
        }
        StorageError::PathEscape(path.display().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, PathGuard) {
        let dir = tempdir().unwrap();
        let upload = dir.path().join("uploads");
        let roots = ManagedRoots::under(&upload);
        for root in roots.all() {
            fs::create_dir_all(root).unwrap();
        }
        fs::write(roots.audio().join("7_03_My_Song.flac"), b"audio").unwrap();
        (dir, PathGuard::from_roots(&roots))
    }

    #[test]
    fn test_resolve_round_trip() {
        let (_dir, guard) = setup();
        let resolved = guard.resolve_for_read("audio/7_03_My_Song.flac").unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(
            guard.to_relative(&resolved).unwrap(),
            "audio/7_03_My_Song.flac"
        );
    }

    #[test]
    fn test_traversal_rejected() {
        let (dir, guard) = setup();
        fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

        assert!(matches!(
            guard.resolve_for_read("../secret.txt"),
            Err(StorageError::PathEscape(_))
        ));
        assert!(matches!(
            guard.resolve_for_read("audio/../../secret.txt"),
            Err(StorageError::PathEscape(_))
        ));
        let absolute = dir.path().join("secret.txt");
        assert!(matches!(
            guard.resolve_for_read(absolute.to_str().unwrap()),
            Err(StorageError::PathEscape(_))
        ));
        assert!(matches!(
            guard.resolve_for_read(""),
            Err(StorageError::PathEscape(_))
        ));
    }

    #[test]
    fn test_dotdot_that_stays_inside_is_resolved() {
        let (_dir, guard) = setup();
        let resolved = guard
            .resolve_for_read("covers/../audio/7_03_My_Song.flac")
            .unwrap();
        assert_eq!(
            guard.to_relative(&resolved).unwrap(),
            "audio/7_03_My_Song.flac"
        );
    }

    #[test]
    fn test_missing_file_is_path_escape() {
        let (_dir, guard) = setup();
        assert!(matches!(
            guard.resolve_for_read("audio/missing.flac"),
            Err(StorageError::PathEscape(_))
        ));
    }

    #[test]
    fn test_sibling_with_shared_prefix_rejected() {
        let (dir, guard) = setup();
        let evil = dir.path().join("uploads-evil");
        fs::create_dir_all(&evil).unwrap();
        fs::write(evil.join("x.flac"), b"x").unwrap();

        assert!(matches!(
            guard.validate_confinement(&evil.join("x.flac")),
            Err(StorageError::PathEscape(_))
        ));
        assert!(matches!(
            guard.to_relative(&evil.join("x.flac")),
            Err(StorageError::PathEscape(_))
        ));
    }

    #[test]
    fn test_root_itself_has_no_stored_form() {
        let (_dir, guard) = setup();
        let root = guard.primary_root().to_path_buf();
        assert!(guard.validate_confinement(&root).is_ok());
        assert!(matches!(
            guard.to_relative(&root),
            Err(StorageError::PathEscape(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let (dir, guard) = setup();
        let outside = dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("passwd"), b"root").unwrap();

        let link = guard.primary_root().join("audio").join("link");
        std::os::unix::fs::symlink(&outside, &link).unwrap();

        assert!(matches!(
            guard.resolve_for_read("audio/link/passwd"),
            Err(StorageError::PathEscape(_))
        ));
        assert!(matches!(
            guard.validate_confinement(&link.join("passwd")),
            Err(StorageError::PathEscape(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_path_escape() {
        let (dir, guard) = setup();
        let link = guard.primary_root().join("dangling.flac");
        std::os::unix::fs::symlink(dir.path().join("nowhere"), &link).unwrap();

        assert!(matches!(
            guard.resolve_for_read("dangling.flac"),
            Err(StorageError::PathEscape(_))
        ));
    }

    #[test]
    fn test_to_relative_with_missing_root_is_path_escape() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.flac");
        fs::write(&file, b"a").unwrap();

        let guard = PathGuard::new(dir.path().join("missing"), std::iter::empty::<PathBuf>());
        assert!(matches!(
            guard.to_relative(&file),
            Err(StorageError::PathEscape(_))
        ));
    }

    #[test]
    fn test_validate_entry_confines_parent() {
        let (dir, guard) = setup();
        let audio = guard.primary_root().join("audio");

        let entry = guard
            .validate_entry(&audio.join("7_03_My_Song.flac"))
            .unwrap();
        assert_eq!(
            entry,
            audio.canonicalize().unwrap().join("7_03_My_Song.flac")
        );

        fs::write(dir.path().join("secret.txt"), b"secret").unwrap();
        assert!(matches!(
            guard.validate_entry(&audio.join("../../secret.txt")),
            Err(StorageError::PathEscape(_))
        ));
        assert!(matches!(
            guard.validate_entry(&audio.join("..")),
            Err(StorageError::PathEscape(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_entry_does_not_follow_symlinks() {
        let (dir, guard) = setup();
        let audio = guard.primary_root().join("audio");

        // points outside the roots, but the link itself lives inside
        let link = audio.join("outside.flac");
        std::os::unix::fs::symlink(dir.path().join("nowhere"), &link).unwrap();
        let entry = guard.validate_entry(&link).unwrap();
        assert_eq!(entry.file_name().unwrap(), "outside.flac");
        assert!(entry.starts_with(audio.canonicalize().unwrap()));

        // a symlinked parent directory is still resolved
        let outside = dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("x.flac"), b"x").unwrap();
        let dir_link = audio.join("elsewhere");
        std::os::unix::fs::symlink(&outside, &dir_link).unwrap();
        assert!(matches!(
            guard.validate_entry(&dir_link.join("x.flac")),
            Err(StorageError::PathEscape(_))
        ));
    }

    #[test]
    fn test_extra_roots_are_accepted() {
        let dir = tempdir().unwrap();
        let upload = dir.path().join("uploads");
        let audio = dir.path().join("audio-volume");
        fs::create_dir_all(&upload).unwrap();
        fs::create_dir_all(&audio).unwrap();
        fs::write(audio.join("a.wav"), b"a").unwrap();

        let guard = PathGuard::new(&upload, [audio.clone()]);
        assert!(guard.validate_confinement(&audio.join("a.wav")).is_ok());
        // confined, but not expressible relative to the upload root
        assert!(guard.to_relative(&audio.join("a.wav")).is_err());
    }
}
