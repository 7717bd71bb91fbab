//! Mock GPU implementation for testing
//!
//! Stores all data in memory and keeps live-object counters, so tests can
//! check that every upload is matched by a destroy. A thread-affine variant
//! rejects calls from any thread other than the one that created it.

use super::{
    BufferUsage, GpuDevice, GpuError, GpuResult, GpuTextureFormat, ShaderStage,
    TextureDescriptor,
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Counter for generating unique buffer/texture/shader IDs
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Default)]
struct Counters {
    allocated_bytes: AtomicU64,
    live_buffers: AtomicUsize,
    live_textures: AtomicUsize,
    live_shaders: AtomicUsize,
}

/// Mock GPU device for testing
#[derive(Clone, Debug, Default)]
pub struct MockGpu {
    counters: Arc<Counters>,
    owner: Option<ThreadId>,
}

impl MockGpu {
    /// Create a new mock GPU device usable from any thread
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock GPU bound to the calling thread
    ///
    /// Every device call made from another thread fails with
    /// [`GpuError::WrongThread`].
    pub fn single_threaded() -> Self {
        Self {
            counters: Arc::default(),
            owner: Some(thread::current().id()),
        }
    }

    /// Total bytes currently allocated
    pub fn allocated_bytes(&self) -> u64 {
        self.counters.allocated_bytes.load(Ordering::Relaxed)
    }

    /// Number of buffers not yet destroyed
    pub fn live_buffers(&self) -> usize {
        self.counters.live_buffers.load(Ordering::Relaxed)
    }

    /// Number of textures not yet destroyed
    pub fn live_textures(&self) -> usize {
        self.counters.live_textures.load(Ordering::Relaxed)
    }

    /// Number of shader programs not yet destroyed
    pub fn live_shaders(&self) -> usize {
        self.counters.live_shaders.load(Ordering::Relaxed)
    }

    fn check_thread(&self) -> GpuResult<()> {
        match self.owner {
            Some(owner) if owner != thread::current().id() => Err(GpuError::WrongThread),
            _ => Ok(()),
        }
    }
}

/// Mock buffer that stores data in memory
#[derive(Clone, Debug)]
pub struct MockBuffer {
    /// Unique identifier
    pub id: u64,
    /// Buffer data
    pub data: Arc<parking_lot::RwLock<Vec<u8>>>,
    /// Buffer usage
    pub usage: BufferUsage,
}

impl MockBuffer {
    fn new(size: usize, usage: BufferUsage) -> Self {
        Self {
            id: next_id(),
            data: Arc::new(parking_lot::RwLock::new(vec![0u8; size])),
            usage,
        }
    }

    /// Get the size of the buffer
    pub fn size(&self) -> usize {
        self.data.read().len()
    }

    /// Read buffer data
    pub fn read_data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

/// Mock texture that stores pixel data in memory
#[derive(Clone, Debug)]
pub struct MockTexture {
    /// Unique identifier
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub format: GpuTextureFormat,
    /// Pixel data
    pub data: Arc<Vec<u8>>,
}

/// Mock shader program keeping its source
#[derive(Clone, Debug)]
pub struct MockShader {
    /// Unique identifier
    pub id: u64,
    pub stage: ShaderStage,
    pub source_len: usize,
}

impl GpuDevice for MockGpu {
    type Buffer = MockBuffer;
    type Texture = MockTexture;
    type Shader = MockShader;

    fn allocate_buffer(&self, size: usize, usage: BufferUsage) -> GpuResult<Self::Buffer> {
        self.check_thread()?;
        if size == 0 {
            return Err(GpuError::InvalidSize(size));
        }

        self.counters
            .allocated_bytes
            .fetch_add(size as u64, Ordering::Relaxed);
        self.counters.live_buffers.fetch_add(1, Ordering::Relaxed);
        Ok(MockBuffer::new(size, usage))
    }

    fn upload_buffer_data(
        &self,
        buffer: &Self::Buffer,
        offset: usize,
        data: &[u8],
    ) -> GpuResult<()> {
        self.check_thread()?;
        let mut buf_data = buffer.data.write();

        if offset + data.len() > buf_data.len() {
            return Err(GpuError::UploadFailed(format!(
                "Data exceeds buffer size: offset={}, data_len={}, buffer_size={}",
                offset,
                data.len(),
                buf_data.len()
            )));
        }

        buf_data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn create_texture(&self, desc: &TextureDescriptor, data: &[u8]) -> GpuResult<Self::Texture> {
        self.check_thread()?;
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::TextureCreationFailed(
                "Invalid texture dimensions".to_string(),
            ));
        }
        if !data.is_empty() && data.len() != desc.byte_size() {
            return Err(GpuError::TextureCreationFailed(format!(
                "Expected {} bytes of texel data, got {}",
                desc.byte_size(),
                data.len()
            )));
        }

        self.counters
            .allocated_bytes
            .fetch_add(desc.byte_size() as u64, Ordering::Relaxed);
        self.counters.live_textures.fetch_add(1, Ordering::Relaxed);

        Ok(MockTexture {
            id: next_id(),
            width: desc.width,
            height: desc.height,
            format: desc.format,
            data: Arc::new(data.to_vec()),
        })
    }

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> GpuResult<Self::Shader> {
        self.check_thread()?;
        if source.trim().is_empty() {
            return Err(GpuError::ShaderCompilationFailed(
                "Empty shader source".to_string(),
            ));
        }

        self.counters.live_shaders.fetch_add(1, Ordering::Relaxed);
        Ok(MockShader {
            id: next_id(),
            stage,
            source_len: source.len(),
        })
    }

    fn destroy_buffer(&self, buffer: Self::Buffer) {
        let size = buffer.size() as u64;
        self.counters
            .allocated_bytes
            .fetch_sub(size, Ordering::Relaxed);
        self.counters.live_buffers.fetch_sub(1, Ordering::Relaxed);
    }

    fn destroy_texture(&self, texture: Self::Texture) {
        let size = texture.width as u64 * texture.height as u64 * texture.format.texel_size() as u64;
        self.counters
            .allocated_bytes
            .fetch_sub(size, Ordering::Relaxed);
        self.counters.live_textures.fetch_sub(1, Ordering::Relaxed);
    }

    fn destroy_shader(&self, _shader: Self::Shader) {
        self.counters.live_shaders.fetch_sub(1, Ordering::Relaxed);
    }

    fn backend_name(&self) -> &'static str {
        "Mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_gpu_allocate_buffer() {
        let gpu = MockGpu::new();
        let buffer = gpu.allocate_buffer(1024, BufferUsage::Storage).unwrap();

        assert_eq!(buffer.size(), 1024);
        assert_eq!(buffer.usage, BufferUsage::Storage);
        assert_eq!(gpu.allocated_bytes(), 1024);
        assert_eq!(gpu.live_buffers(), 1);
    }

    #[test]
    fn test_mock_gpu_upload_with_offset() {
        let gpu = MockGpu::new();
        let buffer = gpu.allocate_buffer(1024, BufferUsage::Storage).unwrap();

        gpu.upload_buffer_data(&buffer, 100, &[5, 6, 7, 8]).unwrap();

        let read_data = buffer.read_data();
        assert_eq!(&read_data[100..104], &[5, 6, 7, 8]);
    }

    #[test]
    fn test_mock_gpu_upload_overflow() {
        let gpu = MockGpu::new();
        let buffer = gpu.allocate_buffer(10, BufferUsage::Storage).unwrap();

        assert!(gpu.upload_buffer_data(&buffer, 0, &[0u8; 20]).is_err());
    }

    #[test]
    fn test_mock_gpu_texture_lifecycle() {
        let gpu = MockGpu::new();
        let desc = TextureDescriptor {
            width: 64,
            height: 64,
            format: GpuTextureFormat::Rgba8Srgb,
            mip_levels: 1,
        };

        let texture = gpu.create_texture(&desc, &vec![0u8; 64 * 64 * 4]).unwrap();
        assert_eq!(texture.width, 64);
        assert_eq!(gpu.live_textures(), 1);

        gpu.destroy_texture(texture);
        assert_eq!(gpu.live_textures(), 0);
        assert_eq!(gpu.allocated_bytes(), 0);
    }

    #[test]
    fn test_mock_gpu_rejects_mismatched_texel_data() {
        let gpu = MockGpu::new();
        let desc = TextureDescriptor::default();
        assert!(gpu.create_texture(&desc, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_mock_gpu_shader_compile() {
        let gpu = MockGpu::new();
        let shader = gpu
            .compile_shader(ShaderStage::Fragment, "void main() {}")
            .unwrap();
        assert_eq!(shader.stage, ShaderStage::Fragment);
        assert_eq!(gpu.live_shaders(), 1);

        assert!(gpu.compile_shader(ShaderStage::Vertex, "  ").is_err());
        gpu.destroy_shader(shader);
        assert_eq!(gpu.live_shaders(), 0);
    }

    #[test]
    fn test_mock_gpu_zero_size_buffer() {
        let gpu = MockGpu::new();
        assert!(gpu.allocate_buffer(0, BufferUsage::Storage).is_err());
    }

    #[test]
    fn test_single_threaded_gpu_rejects_other_threads() {
        let gpu = MockGpu::single_threaded();
        assert!(gpu.allocate_buffer(16, BufferUsage::Uniform).is_ok());

        let remote = gpu.clone();
        let result = std::thread::spawn(move || remote.allocate_buffer(16, BufferUsage::Uniform))
            .join()
            .unwrap();
        assert!(matches!(result, Err(GpuError::WrongThread)));
    }

    #[test]
    fn test_mock_gpu_clone_shares_counters() {
        let gpu1 = MockGpu::new();
        let _buffer = gpu1.allocate_buffer(1024, BufferUsage::Storage).unwrap();

        let gpu2 = gpu1.clone();
        assert_eq!(gpu2.allocated_bytes(), 1024);
    }
}
