//! Audio processing module

pub mod converter;

pub use converter::{AudioConverter, ConversionError, FfmpegConverter};
