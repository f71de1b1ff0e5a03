use wgpu::naga;
use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::PipelineError;
use crate::types::ShaderStageKind;

/// A single shader stage that parsed and validated cleanly.
///
/// The module is kept for reflection during linking; the source text is kept
/// so the GPU backend can build its own shader module from it.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    stage: ShaderStageKind,
    source: String,
    module: naga::Module,
}

impl CompiledShader {
    pub fn stage(&self) -> ShaderStageKind {
        self.stage
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn module(&self) -> &naga::Module {
        &self.module
    }
}

/// Compiles one GLSL stage.
///
/// Parsing runs naga's GLSL frontend for `stage`, then the module is passed
/// through naga's validator. Either failure yields
/// [`PipelineError::CompileFailure`] with the rendered diagnostics; no
/// partially built shader escapes.
pub fn compile(stage: ShaderStageKind, source: &str) -> Result<CompiledShader, PipelineError> {
    let mut frontend = glsl::Frontend::default();
    let options = glsl::Options::from(stage.naga_stage());
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| PipelineError::compile(stage, errors.emit_to_string(source)))?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| PipelineError::compile(stage, err.emit_to_string(source)))?;

    tracing::debug!(
        %stage,
        globals = module.global_variables.len(),
        entry_points = module.entry_points.len(),
        "compiled shader stage"
    );

    Ok(CompiledShader {
        stage,
        source: source.to_owned(),
        module,
    })
}

pub(crate) fn builtin_source(stage: ShaderStageKind) -> &'static str {
    match stage {
        ShaderStageKind::Vertex => VERTEX_SHADER_GLSL,
        ShaderStageKind::Fragment => FRAGMENT_SHADER_GLSL,
    }
}

/// Quad vertex shader: projects 2D positions through `uProjMat * uMVP`.
///
/// The uniform block layout must match the offsets the linker resolves for
/// `uMVP` and `uProjMat` (std140, two column-major `mat4`s).
pub const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 aVertexPosition;

layout(std140, set = 0, binding = 0) uniform Transforms {
    mat4 uMVP;
    mat4 uProjMat;
} transforms;

void main() {
    gl_Position = transforms.uProjMat * transforms.uMVP * vec4(aVertexPosition, 0.0, 1.0);
}
";

/// Flat fill fragment shader driven by `uColor`.
pub const FRAGMENT_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec4 fragColor;

layout(std140, set = 0, binding = 1) uniform Fill {
    vec4 uColor;
} fill;

void main() {
    fragColor = fill.uColor;
}
";
