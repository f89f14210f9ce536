//! Platter operator CLI: ingest, resolve, archive and convert library files
//! directly against the configured storage roots.
//!
//! Reads the same environment as the server (UPLOAD_DIR, FFMPEG_PATH, ...).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use platter_cli::{init_tracing, open_source, print_json};
use platter_core::constants::DEFAULT_CHUNK_SIZE;
use platter_core::{AudioFormat, Config, UploadTarget};
use platter_processing::{AudioConverter, FfmpegConverter};
use platter_services::{ArchiveService, ArchiveSweeper};
use platter_storage::{build_manifest, create_media_store, MediaStore};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "platter", about = "Platter media library storage tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an audio file as a track of an album
    IngestTrack {
        /// Path to the audio file
        file: PathBuf,
        #[arg(long)]
        album_id: u64,
        #[arg(long)]
        track_number: u32,
        #[arg(long)]
        title: String,
        /// Filename to report instead of the file's own name
        #[arg(long)]
        name: Option<String>,
    },
    /// Store an image as the cover art of an album
    IngestCover {
        /// Path to the image
        file: PathBuf,
        #[arg(long)]
        album_id: u64,
        #[arg(long)]
        name: Option<String>,
    },
    /// Resolve a stored reference to its absolute path
    Resolve {
        /// Stored reference, e.g. audio/7_03_My_Song.flac
        reference: String,
    },
    /// Delete a stored file by reference or absolute path
    Delete { path: String },
    /// Bundle stored files into a ZIP archive under the upload root
    Archive {
        /// Archive name; `.zip` is appended when missing
        #[arg(long)]
        name: String,
        /// Stored references to include
        #[arg(required = true)]
        references: Vec<String>,
    },
    /// Delete an archive created by `archive`
    DeleteArchive { path: PathBuf },
    /// Convert a stored track with ffmpeg
    Convert {
        reference: String,
        /// Target format: wav, aiff, flac, alac, mp3, opus
        #[arg(long)]
        format: String,
    },
    /// Remove stale archives left under the upload root
    Sweep,
    /// Print the chunk manifest of a stored file
    Manifest {
        reference: String,
        #[arg(long, default_value = "0")]
        track_id: u64,
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: u64,
    },
}

#[derive(Serialize)]
struct StoredFile {
    reference: String,
    path: PathBuf,
    filename: String,
    size: u64,
}

#[derive(Serialize)]
struct ResolvedFile {
    reference: String,
    path: PathBuf,
    size: u64,
}

#[derive(Serialize)]
struct PathOutput {
    path: PathBuf,
}

#[derive(Serialize)]
struct SweepOutput {
    deleted: usize,
}

async fn ingest(
    store: &dyn MediaStore,
    file: PathBuf,
    name: Option<String>,
    target: UploadTarget,
) -> anyhow::Result<StoredFile> {
    let source = open_source(&file, name.as_deref()).await?;
    let result = store
        .save_upload(source.reader, &source.filename, source.size, &target)
        .await?;
    let reference = store.to_stored_path(&result.path).await?;

    Ok(StoredFile {
        reference,
        path: result.path,
        filename: result.filename,
        size: result.size,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    let cli = Cli::parse();
    let store: Arc<dyn MediaStore> = create_media_store(&config)
        .await
        .context("Failed to initialize storage")?;

    match cli.command {
        Commands::IngestTrack {
            file,
            album_id,
            track_number,
            title,
            name,
        } => {
            let target = UploadTarget::Track {
                album_id,
                track_number,
                title,
            };
            print_json(&ingest(store.as_ref(), file, name, target).await?)?;
        }
        Commands::IngestCover {
            file,
            album_id,
            name,
        } => {
            let target = UploadTarget::CoverArt { album_id };
            print_json(&ingest(store.as_ref(), file, name, target).await?)?;
        }
        Commands::Resolve { reference } => {
            let path = store.resolve_stored_path(&reference).await?;
            let size = store.stored_file_size(&reference).await?;
            print_json(&ResolvedFile {
                reference,
                path,
                size,
            })?;
        }
        Commands::Delete { path } => {
            store.delete_stored_file(&path).await?;
            println!("Deleted {}", path);
        }
        Commands::Archive { name, references } => {
            let mut files = Vec::with_capacity(references.len());
            for reference in &references {
                files.push(store.resolve_stored_path(reference).await?);
            }
            let service = ArchiveService::from_config(&config);
            let path = service.build_archive(files, &name).await?;
            print_json(&PathOutput { path })?;
        }
        Commands::DeleteArchive { path } => {
            ArchiveService::from_config(&config)
                .delete_archive(&path)
                .await?;
            println!("Deleted {}", path.display());
        }
        Commands::Convert { reference, format } => {
            let format: AudioFormat = format.parse().map_err(anyhow::Error::msg)?;
            let input = store.resolve_stored_path(&reference).await?;
            let converter = FfmpegConverter::from_config(&config);
            let path = converter.convert(&input, format).await?;
            print_json(&PathOutput { path })?;
        }
        Commands::Sweep => {
            let deleted = ArchiveSweeper::from_config(&config).sweep().await?;
            print_json(&SweepOutput { deleted })?;
        }
        Commands::Manifest {
            reference,
            track_id,
            chunk_size,
        } => {
            let path = store.resolve_stored_path(&reference).await?;
            let manifest = build_manifest(&path, track_id, chunk_size).await?;
            print_json(&manifest)?;
        }
    }

    Ok(())
}
