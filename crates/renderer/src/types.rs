use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

use wgpu::naga::ShaderStage;

use crate::animation::{ColorRates, DEFAULT_FRAME_QUANTUM};
use crate::error::PipelineError;

/// One of the two programmable stages the quad pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStageKind {
    Vertex,
    Fragment,
}

impl ShaderStageKind {
    pub(crate) fn naga_stage(self) -> ShaderStage {
        match self {
            ShaderStageKind::Vertex => ShaderStage::Vertex,
            ShaderStageKind::Fragment => ShaderStage::Fragment,
        }
    }

    pub(crate) fn from_naga(stage: ShaderStage) -> Option<Self> {
        match stage {
            ShaderStage::Vertex => Some(ShaderStageKind::Vertex),
            ShaderStage::Fragment => Some(ShaderStageKind::Fragment),
            _ => None,
        }
    }
}

impl fmt::Display for ShaderStageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStageKind::Vertex => f.write_str("vertex"),
            ShaderStageKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// Where the text of a shader stage comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ShaderOrigin {
    /// The GLSL compiled into the binary.
    #[default]
    Builtin,
    /// A GLSL file read once at startup.
    File(PathBuf),
}

impl ShaderOrigin {
    /// Resolves the source text for `stage`.
    pub fn load(&self, stage: ShaderStageKind) -> Result<Cow<'static, str>, PipelineError> {
        match self {
            ShaderOrigin::Builtin => Ok(Cow::Borrowed(crate::compile::builtin_source(stage))),
            ShaderOrigin::File(path) => std::fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|source| PipelineError::ShaderSourceUnavailable {
                    stage,
                    path: path.clone(),
                    source,
                }),
        }
    }
}

/// Which parts of the frame the render loop produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderVariant {
    /// Depth-tested quad drawn with perspective transforms and an inverse
    /// fill color over the animated clear color.
    #[default]
    Full,
    /// Clear the surface with the animated color and nothing else.
    ClearOnly,
}

/// Behaviour when linking cannot resolve an optional uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingUniformPolicy {
    /// Leave the uniform unresolved and skip its upload every frame.
    #[default]
    Skip,
    /// Treat the missing uniform as a link failure.
    Fail,
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors the merged CLI flags and configuration file.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Title of the preview window.
    pub title: String,
    pub variant: RenderVariant,
    /// Fixed time step applied per frame to the color oscillation.
    pub frame_quantum: f64,
    pub rates: ColorRates,
    pub missing_uniform: MissingUniformPolicy,
    /// Present with vsync (FIFO) when true.
    pub vsync: bool,
    pub vertex_shader: ShaderOrigin,
    pub fragment_shader: ShaderOrigin,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            title: "chromaquad".into(),
            variant: RenderVariant::default(),
            frame_quantum: DEFAULT_FRAME_QUANTUM,
            rates: ColorRates::default(),
            missing_uniform: MissingUniformPolicy::default(),
            vsync: true,
            vertex_shader: ShaderOrigin::Builtin,
            fragment_shader: ShaderOrigin::Builtin,
        }
    }
}
