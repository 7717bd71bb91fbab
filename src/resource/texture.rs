//! Texture decoding and upload

use image::ImageFormat;

use super::{Resource, SourceData};
use crate::backend::{Backend, MockBackend};
use crate::error::{CacheError, Result};
use crate::gpu::{GpuDevice, GpuTextureFormat, TextureDescriptor};

/// A texture: RGBA8 pixels on the CPU side, a GPU texture once loaded
pub struct Texture<B: Backend = MockBackend> {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    gpu: Option<<B::Gpu as GpuDevice>::Texture>,
}

impl<B: Backend> Default for Texture<B> {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
            gpu: None,
        }
    }
}

impl<B: Backend> Texture<B> {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Decoded RGBA8 pixels
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The GPU texture, if uploaded
    pub fn gpu_texture(&self) -> Option<&<B::Gpu as GpuDevice>::Texture> {
        self.gpu.as_ref()
    }
}

/// Decode PNG or JPEG bytes into RGBA8
pub fn decode_rgba8(data: &[u8]) -> Result<(u32, u32, Vec<u8>)> {
    let format = image::guess_format(data)?;

    match format {
        ImageFormat::Jpeg | ImageFormat::Png => {}
        _ => {
            return Err(CacheError::UnsupportedFormat(format!(
                "Only JPG/JPEG and PNG formats are supported, got {:?}",
                format.extensions_str()
            )))
        }
    }

    let rgba_img = image::load_from_memory_with_format(data, format)?.into_rgba8();
    let (width, height) = rgba_img.dimensions();
    Ok((width, height, rgba_img.into_raw()))
}

impl<B: Backend> Resource for Texture<B> {
    type Backend = B;
    const KIND: &'static str = "texture";

    fn attach_source(&mut self, source: &SourceData<'_>) -> Result<()> {
        let (width, height, pixels) = decode_rgba8(source.bytes)?;
        self.width = width;
        self.height = height;
        self.pixels = pixels;
        Ok(())
    }

    fn detach_source(&mut self) {
        self.width = 0;
        self.height = 0;
        self.pixels = Vec::new();
    }

    fn load(&mut self, backend: &B) -> Result<()> {
        let desc = TextureDescriptor {
            width: self.width,
            height: self.height,
            format: GpuTextureFormat::Rgba8Srgb,
            mip_levels: 1,
        };
        self.gpu = Some(backend.gpu().create_texture(&desc, &self.pixels)?);
        Ok(())
    }

    fn unload(&mut self, backend: &B) {
        if let Some(texture) = self.gpu.take() {
            backend.gpu().destroy_texture(texture);
        }
    }
}
