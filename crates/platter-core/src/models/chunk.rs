//! Chunked-transfer data shapes.
//!
//! A manifest describes how a stored file splits into fixed-size chunks with
//! per-chunk SHA-256 checksums. Nothing in the upload path consumes these yet;
//! a staged-upload protocol would verify each incoming chunk against the
//! manifest before assembling the final file.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::validation::ValidationError;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub index: usize,
    pub offset: u64,
    pub size: u64,
    /// SHA-256 of this chunk; empty until computed.
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
    pub track_id: u64,
    pub filename: String,
    pub total_size: u64,
    pub chunk_size: u64,
    pub total_chunks: usize,
    /// SHA-256 of the full file; empty until computed.
    pub checksum: String,
    pub chunks: Vec<ChunkInfo>,
}

impl ChunkManifest {
    /// Lay out chunk offsets and sizes without reading any data.
    pub fn plan(
        track_id: u64,
        filename: impl Into<String>,
        total_size: u64,
        chunk_size: u64,
    ) -> Result<Self, ValidationError> {
        if chunk_size == 0 {
            return Err(ValidationError::invalid(
                "chunk_size",
                "must be greater than zero",
            ));
        }

        let chunks: Vec<ChunkInfo> = (0..total_size)
            .step_by(chunk_size as usize)
            .enumerate()
            .map(|(index, offset)| ChunkInfo {
                index,
                offset,
                size: chunk_size.min(total_size - offset),
                checksum: String::new(),
            })
            .collect();

        Ok(Self {
            track_id,
            filename: filename.into(),
            total_size,
            chunk_size,
            total_chunks: chunks.len(),
            checksum: String::new(),
            chunks,
        })
    }

    pub fn chunk(&self, index: usize) -> Option<&ChunkInfo> {
        self.chunks.get(index)
    }

    /// Whether `data` matches the recorded size and checksum of chunk `index`.
    pub fn verify_chunk(&self, index: usize, data: &[u8]) -> bool {
        match self.chunk(index) {
            Some(info) => {
                !info.checksum.is_empty()
                    && info.size == data.len() as u64
                    && sha256_hex(data) == info.checksum
            }
            None => false,
        }
    }

    pub fn progress(&self) -> DownloadProgress {
        DownloadProgress::new(self.track_id, self.total_chunks)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub track_id: u64,
    pub completed_chunks: Vec<usize>,
    pub total_chunks: usize,
    pub percentage: f64,
}

impl DownloadProgress {
    pub fn new(track_id: u64, total_chunks: usize) -> Self {
        Self {
            track_id,
            completed_chunks: Vec::new(),
            total_chunks,
            percentage: if total_chunks == 0 { 100.0 } else { 0.0 },
        }
    }

    /// Mark chunk `index` complete. Returns false for out-of-range or repeated indices.
    pub fn record(&mut self, index: usize) -> bool {
        if index >= self.total_chunks || self.completed_chunks.contains(&index) {
            return false;
        }
        self.completed_chunks.push(index);
        self.percentage = self.completed_chunks.len() as f64 * 100.0 / self.total_chunks as f64;
        true
    }

    pub fn is_complete(&self) -> bool {
        self.completed_chunks.len() == self.total_chunks
    }
}
