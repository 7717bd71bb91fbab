//! Audio tracks decoded from WAV

use std::io::Cursor;

use super::{Resource, SourceData};
use crate::audio::{AudioDevice, AudioFormat};
use crate::backend::{Backend, MockBackend};
use crate::error::{CacheError, Result};

/// A decoded audio track: interleaved 16-bit PCM, plus a device buffer once loaded
pub struct AudioTrack<B: Backend = MockBackend> {
    format: Option<AudioFormat>,
    samples: Vec<i16>,
    buffer: Option<<B::Audio as AudioDevice>::Buffer>,
}

impl<B: Backend> Default for AudioTrack<B> {
    fn default() -> Self {
        Self {
            format: None,
            samples: Vec::new(),
            buffer: None,
        }
    }
}

impl<B: Backend> AudioTrack<B> {
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Length in sample frames
    pub fn frames(&self) -> usize {
        match self.format {
            Some(format) => self.samples.len() / format.channels.max(1) as usize,
            None => 0,
        }
    }

    pub fn buffer(&self) -> Option<&<B::Audio as AudioDevice>::Buffer> {
        self.buffer.as_ref()
    }
}

/// Decode WAV bytes into interleaved i16 samples
pub fn decode_wav(data: &[u8]) -> Result<(AudioFormat, Vec<i16>)> {
    let mut reader = hound::WavReader::new(Cursor::new(data))?;
    let spec = reader.spec();
    let format = AudioFormat {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    };

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader.samples::<i16>().collect::<std::result::Result<_, _>>()?,
        (hound::SampleFormat::Int, bits @ 1..=32) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| rescale_int(s, bits)))
            .collect::<std::result::Result<_, _>>()?,
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<std::result::Result<_, _>>()?,
        (sample_format, bits) => {
            return Err(CacheError::UnsupportedFormat(format!(
                "{bits}-bit {sample_format:?} WAV"
            )))
        }
    };

    Ok((format, samples))
}

fn rescale_int(sample: i32, bits: u16) -> i16 {
    if bits > 16 {
        (sample >> (bits - 16)) as i16
    } else {
        (sample << (16 - bits)) as i16
    }
}

impl<B: Backend> Resource for AudioTrack<B> {
    type Backend = B;
    const KIND: &'static str = "audio track";

    fn attach_source(&mut self, source: &SourceData<'_>) -> Result<()> {
        let (format, samples) = decode_wav(source.bytes)?;
        self.format = Some(format);
        self.samples = samples;
        Ok(())
    }

    fn detach_source(&mut self) {
        self.format = None;
        self.samples = Vec::new();
    }

    fn load(&mut self, backend: &B) -> Result<()> {
        let format = self
            .format
            .ok_or_else(|| CacheError::InvalidData("audio track has no format".to_string()))?;
        self.buffer = Some(backend.audio().create_buffer(&format, &self.samples)?);
        Ok(())
    }

    fn unload(&mut self, backend: &B) {
        if let Some(buffer) = self.buffer.take() {
            backend.audio().destroy_buffer(buffer);
        }
    }
}
