//! GPU abstraction layer for backend-agnostic resource uploads
//!
//! Every upload the cache makes goes through this trait.
//! Implementations are free to be single-threaded; the cache never calls
//! into a device from its parallel decode workers.

pub mod mock;

use std::fmt::Debug;
use thiserror::Error;

/// Error type for GPU operations
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("Buffer upload failed: {0}")]
    UploadFailed(String),

    #[error("Texture creation failed: {0}")]
    TextureCreationFailed(String),

    #[error("Shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    #[error("Invalid buffer size: {0}")]
    InvalidSize(usize),

    #[error("Device used from a thread other than its owner")]
    WrongThread,
}

/// Result type for GPU operations
pub type GpuResult<T> = Result<T, GpuError>;

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Uniform buffer
    Uniform,
    /// Storage buffer, used for font glyph tables
    Storage,
}

/// Texture format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuTextureFormat {
    /// RGBA 8-bit with sRGB color space
    Rgba8Srgb,
    /// Single channel 8-bit, used for glyph atlases
    R8Unorm,
}

impl GpuTextureFormat {
    /// Bytes per texel
    pub fn texel_size(&self) -> usize {
        match self {
            Self::Rgba8Srgb => 4,
            Self::R8Unorm => 1,
        }
    }
}

/// Texture descriptor for creation
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Texture format
    pub format: GpuTextureFormat,
    /// Number of mip levels (1 = no mipmaps)
    pub mip_levels: u32,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            format: GpuTextureFormat::Rgba8Srgb,
            mip_levels: 1,
        }
    }
}

impl TextureDescriptor {
    /// Size in bytes of the base mip level
    pub fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.texel_size()
    }
}

/// Pipeline stage a shader program is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    /// Source that carries several entry points (e.g. WGSL modules)
    Combined,
    Compute,
}

/// Core GPU device trait for backend-agnostic operations
///
/// # Associated Types
/// - `Buffer`: The buffer type for this GPU backend
/// - `Texture`: The texture type for this GPU backend
/// - `Shader`: A compiled shader program
///
/// # Example
/// ```ignore
/// let gpu = MockGpu::new();
/// let texture = gpu.create_texture(&desc, &pixels)?;
/// let program = gpu.compile_shader(ShaderStage::Fragment, source)?;
/// ```
pub trait GpuDevice: Send + Sync + Clone + Debug + 'static {
    /// Buffer type for this GPU backend
    type Buffer: Clone + Send + Sync + Debug + 'static;

    /// Texture type for this GPU backend
    type Texture: Clone + Send + Sync + Debug + 'static;

    /// Compiled shader program type for this GPU backend
    type Shader: Clone + Send + Sync + Debug + 'static;

    /// Allocate a GPU buffer
    fn allocate_buffer(&self, size: usize, usage: BufferUsage) -> GpuResult<Self::Buffer>;

    /// Upload data to a buffer at a byte offset
    fn upload_buffer_data(
        &self,
        buffer: &Self::Buffer,
        offset: usize,
        data: &[u8],
    ) -> GpuResult<()>;

    /// Create a texture from data
    ///
    /// `data` may be empty for render targets.
    fn create_texture(&self, desc: &TextureDescriptor, data: &[u8]) -> GpuResult<Self::Texture>;

    /// Compile a shader program for the given stage
    fn compile_shader(&self, stage: ShaderStage, source: &str) -> GpuResult<Self::Shader>;

    /// Destroy a buffer (optional cleanup)
    fn destroy_buffer(&self, _buffer: Self::Buffer) {}

    /// Destroy a texture (optional cleanup)
    fn destroy_texture(&self, _texture: Self::Texture) {}

    /// Destroy a shader program (optional cleanup)
    fn destroy_shader(&self, _shader: Self::Shader) {}

    /// Get the name of this GPU backend (for debugging)
    fn backend_name(&self) -> &'static str;
}

pub use mock::MockGpu;
