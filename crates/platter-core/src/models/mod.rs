pub mod audio;
pub mod chunk;
pub mod upload;

pub use audio::{AudioFormat, AudioQuality};
pub use chunk::{sha256_hex, ChunkInfo, ChunkManifest, DownloadProgress};
pub use upload::{FileUploadResult, ManagedRoots, UploadKind, UploadPolicy, UploadTarget};
