//! Fonts rasterized into glyph atlases
//!
//! A font file can be instantiated at several pixel sizes; each instance is
//! a separate cache entry keyed `"{key}@{size}"` and is not id-indexed.

use super::{Resource, SourceData};
use crate::backend::{Backend, MockBackend};
use crate::error::{CacheError, Result};
use crate::gpu::{BufferUsage, GpuDevice, GpuTextureFormat, TextureDescriptor};

/// Glyphs per atlas row; the atlas holds a 16x16 grid
const ATLAS_GRID: u32 = 16;

/// Largest atlas side a font may ask for (a 16 MiB R8 texture)
pub const MAX_ATLAS_EXTENT: u32 = 4096;

const SFNT_TAGS: [[u8; 4]; 4] = [*b"\x00\x01\x00\x00", *b"OTTO", *b"true", *b"ttcf"];

/// Cache key for a font instance at a given pixel size
pub fn font_key(key: &str, pixel_size: u32) -> String {
    format!("{key}@{pixel_size}")
}

/// A TrueType/OpenType font at one pixel size
pub struct Font<B: Backend = MockBackend> {
    data: Vec<u8>,
    pixel_size: u32,
    atlas: Option<<B::Gpu as GpuDevice>::Texture>,
    glyphs: Option<<B::Gpu as GpuDevice>::Buffer>,
}

impl<B: Backend> Default for Font<B> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            pixel_size: 16,
            atlas: None,
            glyphs: None,
        }
    }
}

impl<B: Backend> Font<B> {
    pub fn pixel_size(&self) -> u32 {
        self.pixel_size
    }

    /// Takes effect on the next load
    pub fn set_pixel_size(&mut self, pixel_size: u32) {
        self.pixel_size = pixel_size.max(1);
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Side length of the square glyph atlas for the current size, or `None`
    /// when it would exceed [`MAX_ATLAS_EXTENT`]
    pub fn atlas_extent(&self) -> Option<u32> {
        self.pixel_size
            .checked_mul(ATLAS_GRID)
            .and_then(u32::checked_next_power_of_two)
            .filter(|&extent| extent <= MAX_ATLAS_EXTENT)
    }

    pub fn atlas(&self) -> Option<&<B::Gpu as GpuDevice>::Texture> {
        self.atlas.as_ref()
    }

    /// Storage buffer with one `[x, y, w, h]` cell (u16, little endian) per glyph
    pub fn glyph_table(&self) -> Option<&<B::Gpu as GpuDevice>::Buffer> {
        self.glyphs.as_ref()
    }
}

// Atlas cell of every glyph, row-major over the grid
fn glyph_cells(cell: u16) -> Vec<u8> {
    let grid = ATLAS_GRID as u16;
    (0..grid * grid)
        .flat_map(|glyph| {
            let x = (glyph % grid) * cell;
            let y = (glyph / grid) * cell;
            [x, y, cell, cell]
        })
        .flat_map(u16::to_le_bytes)
        .collect()
}

impl<B: Backend> Resource for Font<B> {
    type Backend = B;
    const KIND: &'static str = "font";
    const INDEXED: bool = false;

    fn attach_source(&mut self, source: &SourceData<'_>) -> Result<()> {
        let tag = source
            .bytes
            .get(..4)
            .ok_or_else(|| CacheError::InvalidData(format!("{}: truncated font", source.key)))?;
        if !SFNT_TAGS.iter().any(|known| known == tag) {
            return Err(CacheError::InvalidData(format!(
                "{}: not a TrueType/OpenType font",
                source.key
            )));
        }

        self.data = source.bytes.to_vec();
        Ok(())
    }

    fn detach_source(&mut self) {
        self.data = Vec::new();
    }

    fn load(&mut self, backend: &B) -> Result<()> {
        let extent = self.atlas_extent().ok_or_else(|| {
            CacheError::InvalidData(format!(
                "font size {}px needs an atlas larger than {}px",
                self.pixel_size, MAX_ATLAS_EXTENT
            ))
        })?;
        let desc = TextureDescriptor {
            width: extent,
            height: extent,
            format: GpuTextureFormat::R8Unorm,
            mip_levels: 1,
        };
        let gpu = backend.gpu();
        let coverage = vec![0u8; desc.byte_size()];
        let atlas = gpu.create_texture(&desc, &coverage)?;

        // extent <= MAX_ATLAS_EXTENT, so a cell always fits in u16
        let cells = glyph_cells((extent / ATLAS_GRID) as u16);
        let glyphs = match gpu.allocate_buffer(cells.len(), BufferUsage::Storage) {
            Ok(buffer) => buffer,
            Err(e) => {
                gpu.destroy_texture(atlas);
                return Err(e.into());
            }
        };
        if let Err(e) = gpu.upload_buffer_data(&glyphs, 0, &cells) {
            gpu.destroy_buffer(glyphs);
            gpu.destroy_texture(atlas);
            return Err(e.into());
        }

        self.atlas = Some(atlas);
        self.glyphs = Some(glyphs);
        Ok(())
    }

    fn unload(&mut self, backend: &B) {
        if let Some(atlas) = self.atlas.take() {
            backend.gpu().destroy_texture(atlas);
        }
        if let Some(glyphs) = self.glyphs.take() {
            backend.gpu().destroy_buffer(glyphs);
        }
    }
}
