//! Configuration module
//!
//! The storage core is configured once at startup from the environment and the
//! resulting [`Config`] is passed explicitly to every component that needs it.
//! Nothing in this module is global or mutable after construction.

use std::env;
use std::path::{Path, PathBuf};

use crate::constants::{
    AUDIO_SUBDIR, COVER_ART_SUBDIR, DEFAULT_MAX_AUDIO_FILE_SIZE_MB, DEFAULT_MAX_COVER_ART_SIZE_MB,
};
use crate::models::{ManagedRoots, UploadPolicy};

const BYTES_PER_MB: u64 = 1024 * 1024;
const ARCHIVE_MAX_AGE_SECS: u64 = 3600;
const DEFAULT_UPLOAD_DIR: &str = "./uploads";
const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

/// Storage core configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub upload_dir: PathBuf,
    pub audio_dir: PathBuf,
    pub cover_art_dir: PathBuf,
    pub max_audio_file_size_bytes: u64,
    pub max_cover_art_size_bytes: u64,
    pub ffmpeg_path: String,
    pub conversion_temp_dir: PathBuf,
    /// Archives under the upload root older than this are removed by the sweeper.
    pub archive_max_age_secs: u64,
    pub environment: String,
}

impl Config {
    /// Load configuration from `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Numeric values that fail to parse fall back to their defaults. Empty
    /// strings are treated as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let upload_dir = var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));
        let audio_dir = var("AUDIO_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| upload_dir.join(AUDIO_SUBDIR));
        let cover_art_dir = var("COVER_ART_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| upload_dir.join(COVER_ART_SUBDIR));

        let max_audio_mb = var("MAX_AUDIO_FILE_SIZE_MB")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_MAX_AUDIO_FILE_SIZE_MB);
        let max_cover_mb = var("MAX_COVER_ART_SIZE_MB")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_MAX_COVER_ART_SIZE_MB);

        let config = Config {
            upload_dir,
            audio_dir,
            cover_art_dir,
            max_audio_file_size_bytes: max_audio_mb.saturating_mul(BYTES_PER_MB),
            max_cover_art_size_bytes: max_cover_mb.saturating_mul(BYTES_PER_MB),
            ffmpeg_path: var("FFMPEG_PATH").unwrap_or_else(|| DEFAULT_FFMPEG_PATH.to_string()),
            conversion_temp_dir: var("CONVERSION_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| env::temp_dir().join("platter-conversions")),
            archive_max_age_secs: var("ARCHIVE_MAX_AGE_SECS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(ARCHIVE_MAX_AGE_SECS),
            environment: var("ENVIRONMENT")
                .or_else(|| var("APP_ENV"))
                .unwrap_or_else(|| "development".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_audio_file_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "MAX_AUDIO_FILE_SIZE_MB must be greater than zero"
            ));
        }

        if self.max_cover_art_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "MAX_COVER_ART_SIZE_MB must be greater than zero"
            ));
        }

        if self.archive_max_age_secs == 0 {
            return Err(anyhow::anyhow!(
                "ARCHIVE_MAX_AGE_SECS must be greater than zero"
            ));
        }

        if self.ffmpeg_path.trim().is_empty() {
            return Err(anyhow::anyhow!("FFMPEG_PATH cannot be empty"));
        }

        for (key, dir) in [
            ("UPLOAD_DIR", &self.upload_dir),
            ("AUDIO_DIR", &self.audio_dir),
            ("COVER_ART_DIR", &self.cover_art_dir),
            ("CONVERSION_TEMP_DIR", &self.conversion_temp_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(anyhow::anyhow!("{} cannot be empty", key));
            }
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    pub fn conversion_temp_dir(&self) -> &Path {
        &self.conversion_temp_dir
    }

    pub fn managed_roots(&self) -> ManagedRoots {
        ManagedRoots::new(
            self.upload_dir.clone(),
            self.audio_dir.clone(),
            self.cover_art_dir.clone(),
        )
    }

    pub fn audio_policy(&self) -> UploadPolicy {
        UploadPolicy::audio(self.max_audio_file_size_bytes)
    }

    pub fn cover_art_policy(&self) -> UploadPolicy {
        UploadPolicy::cover_art(self.max_cover_art_size_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(config.audio_dir, PathBuf::from("./uploads/audio"));
        assert_eq!(config.cover_art_dir, PathBuf::from("./uploads/covers"));
        assert_eq!(config.max_audio_file_size_bytes, 500 * 1024 * 1024);
        assert_eq!(config.max_cover_art_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.ffmpeg_path, "ffmpeg");
        assert_eq!(config.archive_max_age_secs, 3600);
        assert!(!config.is_production());
    }

    #[test]
    fn test_subdirectories_follow_upload_dir() {
        let config = config_from(&[("UPLOAD_DIR", "/srv/media")]).unwrap();
        assert_eq!(config.audio_dir, PathBuf::from("/srv/media/audio"));
        assert_eq!(config.cover_art_dir, PathBuf::from("/srv/media/covers"));
    }

    #[test]
    fn test_explicit_directories_override() {
        let config = config_from(&[
            ("UPLOAD_DIR", "/srv/media"),
            ("AUDIO_DIR", "/mnt/audio"),
            ("COVER_ART_DIR", "/mnt/art"),
        ])
        .unwrap();
        let roots = config.managed_roots();
        assert_eq!(roots.upload(), Path::new("/srv/media"));
        assert_eq!(roots.audio(), Path::new("/mnt/audio"));
        assert_eq!(roots.cover_art(), Path::new("/mnt/art"));
    }

    #[test]
    fn test_unparseable_sizes_fall_back() {
        let config = config_from(&[
            ("MAX_AUDIO_FILE_SIZE_MB", "lots"),
            ("MAX_COVER_ART_SIZE_MB", "2"),
        ])
        .unwrap();
        assert_eq!(config.max_audio_file_size_bytes, 500 * 1024 * 1024);
        assert_eq!(config.max_cover_art_size_bytes, 2 * 1024 * 1024);
        assert_eq!(config.cover_art_policy().max_size(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let err = config_from(&[("MAX_COVER_ART_SIZE_MB", "0")]).unwrap_err();
        assert!(err.to_string().contains("MAX_COVER_ART_SIZE_MB"));
    }

    #[test]
    fn test_zero_archive_age_rejected() {
        let err = config_from(&[("ARCHIVE_MAX_AGE_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("ARCHIVE_MAX_AGE_SECS"));
    }

    #[test]
    fn test_production_detection() {
        let config = config_from(&[("APP_ENV", "Prod")]).unwrap();
        assert!(config.is_production());
    }
}
