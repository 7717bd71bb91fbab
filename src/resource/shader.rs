//! Shader sources and their compiled programs
//!
//! Compilation happens in `load`, against the GPU, so shaders are never
//! decoded on worker threads.

use super::{Resource, SourceData};
use crate::backend::{Backend, MockBackend};
use crate::error::{CacheError, Result};
use crate::gpu::{GpuDevice, ShaderStage};

fn stage_for_extension(extension: &str) -> Option<ShaderStage> {
    match extension {
        "vert" | "vs" => Some(ShaderStage::Vertex),
        "frag" | "fs" => Some(ShaderStage::Fragment),
        "geom" => Some(ShaderStage::Geometry),
        "glsl" | "wgsl" => Some(ShaderStage::Combined),
        _ => None,
    }
}

fn utf8_source(source: &SourceData<'_>) -> Result<String> {
    std::str::from_utf8(source.bytes)
        .map(str::to_owned)
        .map_err(|e| CacheError::InvalidData(format!("{}: {e}", source.key)))
}

/// A graphics shader
pub struct Shader<B: Backend = MockBackend> {
    stage: Option<ShaderStage>,
    source: String,
    program: Option<<B::Gpu as GpuDevice>::Shader>,
}

impl<B: Backend> Default for Shader<B> {
    fn default() -> Self {
        Self {
            stage: None,
            source: String::new(),
            program: None,
        }
    }
}

impl<B: Backend> Shader<B> {
    /// Stage derived from the source extension
    pub fn stage(&self) -> Option<ShaderStage> {
        self.stage
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compiled program, if loaded
    pub fn program(&self) -> Option<&<B::Gpu as GpuDevice>::Shader> {
        self.program.as_ref()
    }
}

impl<B: Backend> Resource for Shader<B> {
    type Backend = B;
    const KIND: &'static str = "shader";

    fn attach_source(&mut self, source: &SourceData<'_>) -> Result<()> {
        let stage = stage_for_extension(source.extension).ok_or_else(|| {
            CacheError::UnsupportedFormat(format!(
                "'{}' is not a graphics shader extension",
                source.extension
            ))
        })?;
        self.source = utf8_source(source)?;
        self.stage = Some(stage);
        Ok(())
    }

    fn detach_source(&mut self) {
        self.stage = None;
        self.source = String::new();
    }

    fn load(&mut self, backend: &B) -> Result<()> {
        let stage = self.stage.unwrap_or(ShaderStage::Combined);
        self.program = Some(backend.gpu().compile_shader(stage, &self.source)?);
        Ok(())
    }

    fn unload(&mut self, backend: &B) {
        if let Some(program) = self.program.take() {
            backend.gpu().destroy_shader(program);
        }
    }
}

/// A compute shader
pub struct ComputeShader<B: Backend = MockBackend> {
    source: String,
    program: Option<<B::Gpu as GpuDevice>::Shader>,
}

impl<B: Backend> Default for ComputeShader<B> {
    fn default() -> Self {
        Self {
            source: String::new(),
            program: None,
        }
    }
}

impl<B: Backend> ComputeShader<B> {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn program(&self) -> Option<&<B::Gpu as GpuDevice>::Shader> {
        self.program.as_ref()
    }
}

impl<B: Backend> Resource for ComputeShader<B> {
    type Backend = B;
    const KIND: &'static str = "compute shader";

    fn attach_source(&mut self, source: &SourceData<'_>) -> Result<()> {
        self.source = utf8_source(source)?;
        Ok(())
    }

    fn detach_source(&mut self) {
        self.source = String::new();
    }

    fn load(&mut self, backend: &B) -> Result<()> {
        self.program = Some(
            backend
                .gpu()
                .compile_shader(ShaderStage::Compute, &self.source)?,
        );
        Ok(())
    }

    fn unload(&mut self, backend: &B) {
        if let Some(program) = self.program.take() {
            backend.gpu().destroy_shader(program);
        }
    }
}
