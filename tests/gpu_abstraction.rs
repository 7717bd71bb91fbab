//! Integration tests for the device abstraction layer

use archetype_cache::{
    AudioDevice, AudioFormat, Backend, BufferUsage, GpuDevice, GpuError, GpuTextureFormat,
    MockAudio, MockBackend, MockGpu, ShaderStage, TextureDescriptor,
};

#[test]
fn test_mock_gpu_integration() {
    let gpu = MockGpu::new();

    let buffer = gpu.allocate_buffer(1024, BufferUsage::Storage).unwrap();
    let data = vec![1u8, 2, 3, 4];
    gpu.upload_buffer_data(&buffer, 0, &data).unwrap();

    assert!(buffer.size() >= 1024);
    assert_eq!(&buffer.read_data()[..4], &data[..]);
}

#[test]
fn test_gpu_trait_as_bound() {
    fn upload_white<G: GpuDevice>(gpu: &G) -> G::Texture {
        let desc = TextureDescriptor {
            width: 2,
            height: 2,
            format: GpuTextureFormat::Rgba8Srgb,
            mip_levels: 1,
        };
        gpu.create_texture(&desc, &[255; 16]).unwrap()
    }

    let gpu = MockGpu::new();
    let texture = upload_white(&gpu);
    assert_eq!(gpu.live_textures(), 1);
    gpu.destroy_texture(texture);
    assert_eq!(gpu.live_textures(), 0);
}

#[test]
fn test_shader_compilation() {
    let gpu = MockGpu::new();
    let program = gpu
        .compile_shader(ShaderStage::Fragment, "void main() {}")
        .unwrap();
    assert_eq!(program.stage, ShaderStage::Fragment);
    assert!(gpu.compile_shader(ShaderStage::Vertex, "").is_err());
}

#[test]
fn test_single_threaded_device_rejects_other_threads() {
    let gpu = MockGpu::single_threaded();
    let remote = gpu.clone();

    let result = std::thread::spawn(move || remote.allocate_buffer(16, BufferUsage::Uniform))
        .join()
        .unwrap();
    assert!(matches!(result, Err(GpuError::WrongThread)));
    assert!(gpu.allocate_buffer(16, BufferUsage::Uniform).is_ok());
}

#[test]
fn test_backend_bundles_devices() {
    let backend = MockBackend::new();
    let format = AudioFormat {
        channels: 2,
        sample_rate: 48_000,
    };
    let buffer = backend.audio().create_buffer(&format, &[0; 8]).unwrap();
    assert_eq!(backend.audio.live_buffers(), 1);
    backend.audio().destroy_buffer(buffer);

    assert_eq!(backend.gpu().backend_name(), MockGpu::new().backend_name());
    assert_eq!(
        backend.audio().backend_name(),
        MockAudio::new().backend_name()
    );
}
