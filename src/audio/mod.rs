//! Audio output abstraction
//!
//! Decoded tracks are handed to an [`AudioDevice`] as interleaved 16-bit
//! samples. Like the GPU, the device may only be usable from one thread.

pub mod mock;

use std::fmt::Debug;
use thiserror::Error;

/// Error type for audio device operations
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),

    #[error("Buffer creation failed: {0}")]
    BufferCreationFailed(String),

    #[error("Device used from a thread other than its owner")]
    WrongThread,
}

/// Result type for audio device operations
pub type AudioResult<T> = Result<T, AudioError>;

/// Layout of a PCM sample stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

/// Device that owns playable sample buffers
pub trait AudioDevice: Send + Sync + Clone + Debug + 'static {
    /// Playable buffer type for this backend
    type Buffer: Clone + Send + Sync + Debug + 'static;

    /// Upload interleaved samples into a new buffer
    fn create_buffer(&self, format: &AudioFormat, samples: &[i16]) -> AudioResult<Self::Buffer>;

    /// Release a buffer (optional cleanup)
    fn destroy_buffer(&self, _buffer: Self::Buffer) {}

    /// Get the name of this audio backend (for debugging)
    fn backend_name(&self) -> &'static str;
}

pub use mock::MockAudio;
