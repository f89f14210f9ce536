//! Audio conversion through an external FFmpeg binary.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use platter_core::{AppError, AudioFormat, Config};
use platter_storage::{PathGuard, StorageError};
use thiserror::Error;
use tokio::process::Command;

/// Lines of ffmpeg stderr kept in a failure message.
const STDERR_TAIL_LINES: usize = 10;

#[derive(Debug, Error)]
pub enum ConversionError {
    /// The conversion tool is missing or does not run.
    #[error("Conversion unavailable: {0}")]
    Unavailable(String),

    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Conversion failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::Unavailable(msg) => AppError::ConversionUnavailable(msg),
            ConversionError::InputNotFound(_) => AppError::NotFound("File not found".to_string()),
            ConversionError::Failed(_) | ConversionError::Io(_) => {
                AppError::MediaConversion(err.to_string())
            }
            ConversionError::Storage(e) => AppError::from(e),
        }
    }
}

/// Converts an audio file to another format.
#[async_trait]
pub trait AudioConverter: Send + Sync {
    /// Convert `input` and return the path of the converted file. The caller
    /// owns the output and releases it with [`AudioConverter::cleanup_temp_file`].
    async fn convert(&self, input: &Path, format: AudioFormat) -> Result<PathBuf, ConversionError>;

    /// Delete a converted file. Only files inside the converter's temp
    /// directory are touched; a missing file is a no-op.
    async fn cleanup_temp_file(&self, path: &Path) -> Result<(), ConversionError>;

    fn supported_formats(&self) -> &'static [AudioFormat] {
        &AudioFormat::ALL
    }
}

pub struct FfmpegConverter {
    ffmpeg_path: String,
    temp_dir: PathBuf,
}

impl FfmpegConverter {
    pub fn new(ffmpeg_path: impl Into<String>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            temp_dir: temp_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ffmpeg_path(), config.conversion_temp_dir())
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Check that the binary runs (`ffmpeg -version`).
    pub async fn check_available(&self) -> Result<(), ConversionError> {
        let status = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                ConversionError::Unavailable(format!("Failed to execute {}: {}", self.ffmpeg_path, e))
            })?;

        if !status.success() {
            return Err(ConversionError::Unavailable(format!(
                "{} -version exited with {}",
                self.ffmpeg_path, status
            )));
        }

        Ok(())
    }

    /// Output location for converting `input` to `format`.
    pub fn output_path(&self, input: &Path, format: AudioFormat) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        self.temp_dir
            .join(format!("{}_converted.{}", stem, format.extension()))
    }
}

/// FFmpeg arguments for one conversion: input, overwrite, codec settings, output.
pub fn ffmpeg_args(input: &Path, format: AudioFormat, output: &Path) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-y".to_string(),
    ];

    let codec_args: &[&str] = match format {
        AudioFormat::Aiff => &["-acodec", "pcm_s16be", "-f", "aiff"],
        AudioFormat::Wav => &["-acodec", "pcm_s16le", "-f", "wav"],
        AudioFormat::Flac => &["-acodec", "flac", "-compression_level", "5"],
        AudioFormat::Alac => &["-acodec", "alac", "-f", "mp4"],
        AudioFormat::Mp3 => &["-acodec", "libmp3lame", "-b:a", "320k", "-ar", "44100"],
        AudioFormat::Opus => &["-acodec", "libopus", "-b:a", "192k", "-vbr", "on"],
    };
    args.extend(codec_args.iter().map(|a| a.to_string()));

    args.push(output.to_string_lossy().to_string());
    args
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n")
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
    #[tracing::instrument(skip(self, input), fields(input = %input.display()))]
    async fn convert(&self, input: &Path, format: AudioFormat) -> Result<PathBuf, ConversionError> {
        self.check_available().await?;

        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(ConversionError::InputNotFound(input.to_path_buf()));
        }

        tokio::fs::create_dir_all(&self.temp_dir).await?;

        let output_path = self.output_path(input, format);
        let args = ffmpeg_args(input, format, &output_path);
        let start = Instant::now();

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ConversionError::Unavailable(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = stderr_tail(&output.stderr);
            tracing::error!(status = %output.status, stderr = %stderr, "FFmpeg conversion failed");
            return Err(ConversionError::Failed(format!(
                "ffmpeg exited with {}: {}",
                output.status, stderr
            )));
        }

        if !tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
            return Err(ConversionError::Failed(
                "output file was not created".to_string(),
            ));
        }

        tracing::info!(
            output = %output_path.display(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Audio conversion completed"
        );

        Ok(output_path)
    }

    async fn cleanup_temp_file(&self, path: &Path) -> Result<(), ConversionError> {
        if path.as_os_str().is_empty() || !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(());
        }

        let guard = PathGuard::new(&self.temp_dir, std::iter::empty::<PathBuf>());
        let canonical = guard.validate_confinement(path)?;

        match tokio::fs::remove_file(&canonical).await {
            Ok(()) => {
                tracing::debug!(path = %canonical.display(), "Converted file removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::error!(path = %canonical.display(), error = %e, "Failed to remove converted file");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platter_core::ErrorMetadata;
    use tempfile::tempdir;

    #[test]
    fn test_ffmpeg_args_per_format() {
        let input = Path::new("/in/track.wav");
        let output = Path::new("/tmp/track_converted.m4a");

        let args = ffmpeg_args(input, AudioFormat::Alac, output);
        assert_eq!(
            args,
            vec![
                "-i",
                "/in/track.wav",
                "-y",
                "-acodec",
                "alac",
                "-f",
                "mp4",
                "/tmp/track_converted.m4a"
            ]
        );

        let args = ffmpeg_args(input, AudioFormat::Mp3, output);
        assert!(args.windows(2).any(|w| w == ["-b:a", "320k"]));
        assert!(args.windows(2).any(|w| w == ["-ar", "44100"]));

        let args = ffmpeg_args(input, AudioFormat::Opus, output);
        assert!(args.windows(2).any(|w| w == ["-vbr", "on"]));

        let args = ffmpeg_args(input, AudioFormat::Flac, output);
        assert!(args.windows(2).any(|w| w == ["-compression_level", "5"]));
    }

    #[test]
    fn test_output_path() {
        let converter = FfmpegConverter::new("ffmpeg", "/tmp/conv");
        assert_eq!(
            converter.output_path(Path::new("/a/7_03_My_Song.flac"), AudioFormat::Alac),
            PathBuf::from("/tmp/conv/7_03_My_Song_converted.m4a")
        );
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr: String = (0..20).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(stderr.as_bytes());
        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 19"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        std::fs::write(&input, b"RIFF").unwrap();

        let converter = FfmpegConverter::new(
            dir.path().join("no-such-ffmpeg").display().to_string(),
            dir.path().join("conv"),
        );
        let err = converter.convert(&input, AudioFormat::Mp3).await.unwrap_err();
        assert!(matches!(err, ConversionError::Unavailable(_)));

        let app: AppError = err.into();
        assert_eq!(app.http_status_code(), 503);
    }

    #[tokio::test]
    async fn test_cleanup_confined_to_temp_dir() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join("conv");
        std::fs::create_dir_all(&temp).unwrap();
        let converter = FfmpegConverter::new("ffmpeg", &temp);

        let converted = temp.join("a_converted.mp3");
        std::fs::write(&converted, b"mp3").unwrap();
        converter.cleanup_temp_file(&converted).await.unwrap();
        assert!(!converted.exists());

        // shares a string prefix with the temp dir but is not inside it
        let sibling = dir.path().join("conv-other");
        std::fs::create_dir_all(&sibling).unwrap();
        let outside = sibling.join("keep.mp3");
        std::fs::write(&outside, b"keep").unwrap();
        let err = converter.cleanup_temp_file(&outside).await.unwrap_err();
        assert!(matches!(
            err,
            ConversionError::Storage(StorageError::PathEscape(_))
        ));
        assert!(outside.exists());

        assert!(converter.cleanup_temp_file(&converted).await.is_ok());
        assert!(converter.cleanup_temp_file(Path::new("")).await.is_ok());
    }

    #[test]
    fn test_supported_formats() {
        let converter = FfmpegConverter::new("ffmpeg", "/tmp");
        assert_eq!(converter.supported_formats().len(), 6);
    }
}
