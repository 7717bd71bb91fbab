//! Mock audio device for testing

use super::{AudioDevice, AudioError, AudioFormat, AudioResult};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// In-memory audio device
#[derive(Clone, Debug, Default)]
pub struct MockAudio {
    live_buffers: Arc<AtomicUsize>,
    queued_samples: Arc<AtomicU64>,
    owner: Option<ThreadId>,
}

/// Mock sample buffer
#[derive(Clone, Debug)]
pub struct MockAudioBuffer {
    pub id: u64,
    pub format: AudioFormat,
    pub sample_count: usize,
}

impl MockAudio {
    /// Create a mock device usable from any thread
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock device bound to the calling thread
    pub fn single_threaded() -> Self {
        Self {
            owner: Some(thread::current().id()),
            ..Self::default()
        }
    }

    /// Number of buffers not yet destroyed
    pub fn live_buffers(&self) -> usize {
        self.live_buffers.load(Ordering::Relaxed)
    }

    /// Samples held by live buffers
    pub fn queued_samples(&self) -> u64 {
        self.queued_samples.load(Ordering::Relaxed)
    }
}

impl AudioDevice for MockAudio {
    type Buffer = MockAudioBuffer;

    fn create_buffer(&self, format: &AudioFormat, samples: &[i16]) -> AudioResult<Self::Buffer> {
        if matches!(self.owner, Some(owner) if owner != thread::current().id()) {
            return Err(AudioError::WrongThread);
        }
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(AudioError::InvalidFormat(format!("{format:?}")));
        }
        if samples.len() % format.channels as usize != 0 {
            return Err(AudioError::BufferCreationFailed(
                "Sample count is not a multiple of the channel count".to_string(),
            ));
        }

        self.live_buffers.fetch_add(1, Ordering::Relaxed);
        self.queued_samples
            .fetch_add(samples.len() as u64, Ordering::Relaxed);
        Ok(MockAudioBuffer {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            format: *format,
            sample_count: samples.len(),
        })
    }

    fn destroy_buffer(&self, buffer: Self::Buffer) {
        self.live_buffers.fetch_sub(1, Ordering::Relaxed);
        self.queued_samples
            .fetch_sub(buffer.sample_count as u64, Ordering::Relaxed);
    }

    fn backend_name(&self) -> &'static str {
        "Mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEREO: AudioFormat = AudioFormat {
        channels: 2,
        sample_rate: 44_100,
    };

    #[test]
    fn test_buffer_roundtrip_counts() {
        let audio = MockAudio::new();
        let buffer = audio.create_buffer(&STEREO, &[0; 8]).unwrap();
        assert_eq!(audio.live_buffers(), 1);
        assert_eq!(audio.queued_samples(), 8);

        audio.destroy_buffer(buffer);
        assert_eq!(audio.live_buffers(), 0);
        assert_eq!(audio.queued_samples(), 0);
    }

    #[test]
    fn test_rejects_partial_frames() {
        let audio = MockAudio::new();
        assert!(audio.create_buffer(&STEREO, &[0; 3]).is_err());
    }

    #[test]
    fn test_single_threaded_rejects_other_threads() {
        let audio = MockAudio::single_threaded();
        let remote = audio.clone();
        let result = std::thread::spawn(move || remote.create_buffer(&STEREO, &[0; 2]))
            .join()
            .unwrap();
        assert!(matches!(result, Err(AudioError::WrongThread)));
    }
}
