//! Chunk manifest computation for stored files.

use std::path::Path;

use platter_core::models::sha256_hex;
use platter_core::ChunkManifest;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::traits::StorageResult;

/// Read `path` once, recording a SHA-256 per chunk and for the whole file.
///
/// Memory use is bounded by `chunk_size`.
pub async fn build_manifest(
    path: &Path,
    track_id: u64,
    chunk_size: u64,
) -> StorageResult<ChunkManifest> {
    let mut file = fs::File::open(path).await?;
    let total_size = file.metadata().await?.len();
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut manifest = ChunkManifest::plan(track_id, filename, total_size, chunk_size)?;
    let mut whole = Sha256::new();
    let mut buf = Vec::new();

    for chunk in manifest.chunks.iter_mut() {
        buf.resize(chunk.size as usize, 0);
        file.read_exact(&mut buf).await?;
        whole.update(&buf);
        chunk.checksum = sha256_hex(&buf);
    }

    manifest.checksum = hex::encode(whole.finalize());

    tracing::debug!(
        path = %path.display(),
        total_size = total_size,
        total_chunks = manifest.total_chunks,
        "Chunk manifest built"
    );

    Ok(manifest)
}
