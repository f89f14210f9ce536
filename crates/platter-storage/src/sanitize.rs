//! Filesystem-safe names from untrusted strings.

use platter_core::constants::{COVER_ART_SUFFIX_LEN, MAX_SANITIZED_NAME_LEN};
use rand::Rng;

const RESERVED: [char; 10] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', ' '];

/// Replace reserved characters and spaces with `_` and truncate to
/// [`MAX_SANITIZED_NAME_LEN`] code points.
///
/// Deterministic and idempotent. An empty input yields an empty string, which
/// callers must reject before using it as a whole filename.
pub fn sanitize_name(input: &str) -> String {
    input
        .chars()
        .map(|c| if RESERVED.contains(&c) { '_' } else { c })
        .take(MAX_SANITIZED_NAME_LEN)
        .collect()
}

/// Random lowercase hex suffix of [`COVER_ART_SUFFIX_LEN`] characters from
/// the thread-local CSPRNG.
pub fn random_hex_suffix() -> String {
    let mut rng = rand::rng();
    let random_bytes: Vec<u8> = (0..COVER_ART_SUFFIX_LEN / 2).map(|_| rng.random()).collect();
    hex::encode(random_bytes)
}
