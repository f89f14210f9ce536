//! Stored filename generation.
//!
//! Tracks: `{album_id}_{track_number:02}_{sanitized_title}.{ext}`, unique per
//! (album, track number). Cover art: `{album_id}_{random_hex}.{ext}`, so a new
//! cover never overwrites one still referenced by a live record.

use platter_core::UploadTarget;

use crate::sanitize::{random_hex_suffix, sanitize_name};

pub fn track_filename(album_id: u64, track_number: u32, title: &str, extension: &str) -> String {
    format!(
        "{}_{:02}_{}.{}",
        album_id,
        track_number,
        sanitize_name(title),
        extension
    )
}

pub fn cover_art_filename(album_id: u64, extension: &str) -> String {
    format!("{}_{}.{}", album_id, random_hex_suffix(), extension)
}

/// Filename for `target` with the already-normalized `extension`.
pub fn target_filename(target: &UploadTarget, extension: &str) -> String {
    match target {
        UploadTarget::Track {
            album_id,
            track_number,
            title,
        } => track_filename(*album_id, *track_number, title, extension),
        UploadTarget::CoverArt { album_id } => cover_art_filename(*album_id, extension),
    }
}
