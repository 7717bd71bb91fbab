//! archetype_cache - Keyed resource cache with strong/weak handles
//!
//! # Features
//! - One registry per subsystem, keyed by name with a secondary global-id index
//! - Handles whose strength (owning or observing) is explicit and checked
//! - Uniform resource lifecycle: attach source, load, unload, detach
//! - Two-phase bulk population: parallel decode, serialized device upload
//! - GPU and audio abstraction with thread-affine mock devices
//!
//! # Quick Start
//!
//! ```ignore
//! use archetype_cache::{MockBackend, ResourceCache, SourceFile, Texture};
//!
//! let cache = ResourceCache::new(MockBackend::new());
//! let file = SourceFile::on_disk("wall.png", "assets/wall.png");
//! let wall = cache.load::<Texture>(&file, true);
//! assert!(wall.is_loaded());
//! ```

// Core modules
pub mod cache;
pub mod handle;
pub mod populate;
pub mod resource;
pub mod source;

// External interfaces
pub mod audio;
pub mod backend;
pub mod gpu;

// Support modules
pub mod config;
mod error;
pub use error::{CacheError, Result};

// Re-export cache types
pub use cache::metrics::{CacheMetrics, CacheMetricsHandle};
pub use cache::ResourceCache;
pub use config::CacheConfig;
pub use populate::{PopulateReport, Populator};

// Re-export handle and lifecycle types
pub use handle::{AnyHandle, Handle, ResourceHandle, Strength};
pub use resource::font::font_key;
pub use resource::{
    AudioTrack, ComputeShader, Font, GlobalId, Origin, Resource, ResourceKind, ResourceState,
    Shader, SourceData, Texture,
};

// Re-export source types
pub use source::{
    BinaryListing, DirectoryListing, EmbeddedBinaries, FileListing, MemoryListing, SourceFile,
};

// Re-export interface types
pub use audio::{AudioDevice, AudioError, AudioFormat, MockAudio};
pub use backend::{Backend, MockBackend};
pub use gpu::{
    BufferUsage, GpuDevice, GpuError, GpuResult, GpuTextureFormat, MockGpu, ShaderStage,
    TextureDescriptor,
};

// Version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_cache_available() {
        let cache: ResourceCache = ResourceCache::new(MockBackend::new());
        assert!(cache.is_empty());
    }
}
