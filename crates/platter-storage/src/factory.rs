#[cfg(feature = "storage-local")]
use crate::LocalMediaStore;
use crate::{MediaStore, StorageResult};
use platter_core::Config;
use std::sync::Arc;

/// Create the media store for this configuration.
#[cfg(feature = "storage-local")]
pub async fn create_media_store(config: &Config) -> StorageResult<Arc<dyn MediaStore>> {
    let store = LocalMediaStore::new(config).await?;
    tracing::info!(
        upload_dir = %config.upload_dir().display(),
        audio_dir = %config.audio_dir.display(),
        cover_art_dir = %config.cover_art_dir.display(),
        "Local media store initialized"
    );
    Ok(Arc::new(store))
}

#[cfg(not(feature = "storage-local"))]
pub async fn create_media_store(_config: &Config) -> StorageResult<Arc<dyn MediaStore>> {
    Err(crate::StorageError::ConfigError(
        "Local storage backend not available (storage-local feature not enabled)".to_string(),
    ))
}
