//! Platter Processing Library
//!
//! Media processing behind narrow seams. The storage core never depends on
//! an external tool being installed; conversion failures surface as their
//! own error type.

#[cfg(feature = "audio")]
pub mod audio;

#[cfg(feature = "audio")]
pub use audio::{AudioConverter, ConversionError, FfmpegConverter};
