//! Upload domain types: managed roots, policies, targets and results.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{AUDIO_EXTENSIONS, COVER_ART_EXTENSIONS};
use crate::validation::ValidationError;

/// The configured directories under which every stored file must reside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRoots {
    upload: PathBuf,
    audio: PathBuf,
    cover_art: PathBuf,
}

impl ManagedRoots {
    pub fn new(upload: PathBuf, audio: PathBuf, cover_art: PathBuf) -> Self {
        Self {
            upload,
            audio,
            cover_art,
        }
    }

    /// Roots that follow the default layout: `{upload}/audio` and `{upload}/covers`.
    pub fn under(upload: impl Into<PathBuf>) -> Self {
        let upload = upload.into();
        Self {
            audio: upload.join(crate::constants::AUDIO_SUBDIR),
            cover_art: upload.join(crate::constants::COVER_ART_SUBDIR),
            upload,
        }
    }

    /// General upload root; stored references are relative to this directory.
    pub fn upload(&self) -> &Path {
        &self.upload
    }

    pub fn audio(&self) -> &Path {
        &self.audio
    }

    pub fn cover_art(&self) -> &Path {
        &self.cover_art
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.upload, &self.audio, &self.cover_art]
    }

    /// Destination directory for an upload kind.
    pub fn root_for(&self, kind: UploadKind) -> &Path {
        match kind {
            UploadKind::Audio => &self.audio,
            UploadKind::CoverArt => &self.cover_art,
        }
    }
}

/// Class of upload, each governed by its own [`UploadPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    Audio,
    CoverArt,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Audio => "audio",
            UploadKind::CoverArt => "cover_art",
        }
    }
}

impl Display for UploadKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Extension allow-list and size ceiling for one upload kind.
///
/// Extensions are stored lowercase and compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    kind: UploadKind,
    allowed_extensions: BTreeSet<String>,
    max_size: u64,
}

impl UploadPolicy {
    pub fn new<I, S>(kind: UploadKind, allowed_extensions: I, max_size: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            kind,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            max_size,
        }
    }

    pub fn audio(max_size: u64) -> Self {
        Self::new(UploadKind::Audio, AUDIO_EXTENSIONS, max_size)
    }

    pub fn cover_art(max_size: u64) -> Self {
        Self::new(UploadKind::CoverArt, COVER_ART_EXTENSIONS, max_size)
    }

    pub fn kind(&self) -> UploadKind {
        self.kind
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn allowed_extensions(&self) -> impl Iterator<Item = &str> {
        self.allowed_extensions.iter().map(String::as_str)
    }

    pub fn is_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions
            .contains(&extension.trim_start_matches('.').to_lowercase())
    }

    /// Derive the lowercase extension of `original_filename` and check it
    /// against the allow-list.
    pub fn check_extension(&self, original_filename: &str) -> Result<String, ValidationError> {
        let extension = Path::new(original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match extension {
            Some(ext) if self.allowed_extensions.contains(&ext) => Ok(ext),
            other => Err(ValidationError::UnsupportedFormat {
                extension: other.unwrap_or_else(|| "(none)".to_string()),
                allowed: self.allowed_extensions.iter().cloned().collect(),
            }),
        }
    }

    pub fn check_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_size,
            });
        }
        Ok(())
    }

    /// Extension first, then declared size. Returns the normalized extension.
    pub fn validate(
        &self,
        original_filename: &str,
        declared_size: u64,
    ) -> Result<String, ValidationError> {
        let extension = self.check_extension(original_filename)?;
        self.check_size(declared_size)?;
        Ok(extension)
    }
}

/// Identity of the record an upload belongs to; determines naming and policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadTarget {
    Track {
        album_id: u64,
        track_number: u32,
        title: String,
    },
    CoverArt {
        album_id: u64,
    },
}

impl UploadTarget {
    pub fn kind(&self) -> UploadKind {
        match self {
            UploadTarget::Track { .. } => UploadKind::Audio,
            UploadTarget::CoverArt { .. } => UploadKind::CoverArt,
        }
    }

    pub fn album_id(&self) -> u64 {
        match self {
            UploadTarget::Track { album_id, .. } | UploadTarget::CoverArt { album_id } => *album_id,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            UploadTarget::Track { title, .. } => {
                if title.trim().is_empty() {
                    return Err(ValidationError::MissingField("title"));
                }
            }
            UploadTarget::CoverArt { album_id } => {
                if *album_id == 0 {
                    return Err(ValidationError::invalid("album_id", "must be non-zero"));
                }
            }
        }
        Ok(())
    }
}

/// Outcome of a successful upload. The caller converts `path` to a stored
/// reference before persisting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileUploadResult {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
}
