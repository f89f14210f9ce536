//! Shared constants for the storage core.

/// Maximum number of files accepted by a single archive request.
pub const MAX_ARCHIVE_FILES: usize = 100;

/// Permissions applied to managed directories (rwxr-xr-x).
pub const DIR_PERMISSIONS: u32 = 0o755;

/// Permissions applied to every stored file (rw-r--r--).
pub const FILE_PERMISSIONS: u32 = 0o644;

/// Subdirectory of the upload root that holds track audio.
pub const AUDIO_SUBDIR: &str = "audio";

/// Subdirectory of the upload root that holds cover art.
pub const COVER_ART_SUBDIR: &str = "covers";

/// Extensions accepted for track audio uploads.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "aiff", "flac", "alac", "mp3", "m4a", "opus"];

/// Extensions accepted for cover art uploads.
pub const COVER_ART_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Default audio ceiling: 500 MiB.
pub const DEFAULT_MAX_AUDIO_FILE_SIZE_MB: u64 = 500;

/// Default cover art ceiling: 10 MiB.
pub const DEFAULT_MAX_COVER_ART_SIZE_MB: u64 = 10;

/// Length of the random hex suffix appended to cover art filenames.
pub const COVER_ART_SUFFIX_LEN: usize = 8;

/// Maximum length, in code points, of a sanitized filename component.
pub const MAX_SANITIZED_NAME_LEN: usize = 100;

/// Default chunk size for download manifests (1 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;
