//! Error types for archetype_cache

use thiserror::Error;

/// Main error type for resource lifecycle and population operations
///
/// Cache lookups never produce one of these for a missing or duplicate key;
/// those are logged and answered with a null handle instead.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("GPU error: {0}")]
    Gpu(#[from] crate::gpu::GpuError),

    #[error("Audio error: {0}")]
    Audio(#[from] crate::audio::AudioError),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Source data already set for '{0}'")]
    SourceAlreadySet(String),

    #[error("No source data attached to '{0}'")]
    NoSourceData(String),

    #[error("Resource '{0}' is still loaded")]
    StillLoaded(String),

    #[error("Resource no longer exists")]
    Expired,

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
