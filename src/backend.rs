//! Pairing of the external interfaces a resource may load into.

use crate::audio::{AudioDevice, MockAudio};
use crate::gpu::{GpuDevice, MockGpu};

/// The single-threaded interfaces a cache drives during `load`/`unload`.
pub trait Backend: Send + Sync + 'static {
    type Gpu: GpuDevice;
    type Audio: AudioDevice;

    fn gpu(&self) -> &Self::Gpu;
    fn audio(&self) -> &Self::Audio;
}

/// Backend made of the in-memory mock devices
#[derive(Clone, Debug, Default)]
pub struct MockBackend {
    pub gpu: MockGpu,
    pub audio: MockAudio,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both devices bound to the calling thread
    pub fn single_threaded() -> Self {
        Self {
            gpu: MockGpu::single_threaded(),
            audio: MockAudio::single_threaded(),
        }
    }
}

impl Backend for MockBackend {
    type Gpu = MockGpu;
    type Audio = MockAudio;

    fn gpu(&self) -> &MockGpu {
        &self.gpu
    }

    fn audio(&self) -> &MockAudio {
        &self.audio
    }
}
