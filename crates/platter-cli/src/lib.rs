//! Shared helpers for the `platter` operator binary.

use std::path::Path;

use anyhow::Context;
use platter_storage::UploadReader;
use serde::Serialize;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "platter=info";

/// Initialize tracing for CLI binaries. Logs go to stderr so that stdout
/// carries only command output.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// A local file opened as an upload body.
pub struct LocalSource {
    pub reader: UploadReader,
    pub size: u64,
    pub filename: String,
}

/// Open `path` for ingestion. `name` overrides the filename reported to the
/// store, as a browser would send it.
pub async fn open_source(path: &Path, name: Option<&str>) -> anyhow::Result<LocalSource> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let size = file
        .metadata()
        .await
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?
        .len();

    let filename = match name {
        Some(n) => n.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("Input path has no file name")?,
    };

    Ok(LocalSource {
        reader: Box::pin(file),
        size,
        filename,
    })
}
