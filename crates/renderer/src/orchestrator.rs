use tracing::info;

use crate::compile::compile;
use crate::error::PipelineError;
use crate::gpu::{GpuContext, GpuProgram, MeshBuffer};
use crate::link::{link, LinkedProgram};
use crate::mesh::MeshGeometry;
use crate::types::{RendererConfig, ShaderStageKind};

/// Sequences startup: load sources, compile both stages, link, realise the
/// program on the device and upload the quad.
///
/// Every step runs at most once. The first failure is returned to the caller,
/// which owns reporting it; nothing after it runs.
pub struct Orchestrator<'a> {
    config: &'a RendererConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a RendererConfig) -> Self {
        Self { config }
    }

    /// Compile and link without touching the GPU.
    pub fn prepare(&self) -> Result<LinkedProgram, PipelineError> {
        let vertex_source = self.config.vertex_shader.load(ShaderStageKind::Vertex)?;
        let fragment_source = self.config.fragment_shader.load(ShaderStageKind::Fragment)?;

        let vertex = compile(ShaderStageKind::Vertex, &vertex_source)?;
        let fragment = compile(ShaderStageKind::Fragment, &fragment_source)?;
        info!("compiled vertex and fragment shaders");

        let program = link(vertex, fragment, self.config.missing_uniform)?;
        let bindings = program.bindings();
        info!(
            attribute_location = bindings.vertex_position.location,
            fill_color = bindings.fill_color.is_some(),
            "linked shader program"
        );
        Ok(program)
    }

    pub(crate) fn start(
        &self,
        context: &GpuContext,
    ) -> Result<(GpuProgram, MeshBuffer), PipelineError> {
        let program = self.prepare()?;
        self.realise(context, &program)
    }

    fn realise(
        &self,
        context: &GpuContext,
        program: &LinkedProgram,
    ) -> Result<(GpuProgram, MeshBuffer), PipelineError> {
        let gpu_program = GpuProgram::new(&context.device, program, context.surface_format)?;
        let mesh = MeshBuffer::upload(&context.device, &MeshGeometry::quad())?;
        info!(
            variant = ?self.config.variant,
            vertices = mesh.vertex_count,
            bytes = mesh.byte_len,
            "pipeline ready"
        );
        Ok((gpu_program, mesh))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::types::{MissingUniformPolicy, ShaderOrigin};

    #[test]
    fn builtin_sources_prepare_cleanly() {
        let config = RendererConfig::default();
        let program = Orchestrator::new(&config).prepare().expect("prepare");
        assert!(program.bindings().fill_color.is_some());
    }

    #[test]
    fn unreadable_override_is_reported_before_compiling() {
        let config = RendererConfig {
            fragment_shader: ShaderOrigin::File("/definitely/missing/fragment.glsl".into()),
            ..RendererConfig::default()
        };
        let err = Orchestrator::new(&config).prepare().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ShaderSourceUnavailable {
                stage: ShaderStageKind::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn broken_fragment_override_fails_compilation() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "#version 450\nvoid main() {{ this is not glsl }}").expect("write");

        let config = RendererConfig {
            fragment_shader: ShaderOrigin::File(file.path().to_path_buf()),
            ..RendererConfig::default()
        };
        let err = Orchestrator::new(&config).prepare().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::CompileFailure {
                stage: ShaderStageKind::Fragment,
                ..
            }
        ));
        assert!(!err.log().unwrap_or_default().is_empty());
    }

    #[test]
    fn fragment_without_fill_color_respects_policy() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "#version 450\nlayout(location = 0) out vec4 fragColor;\nvoid main() {{ fragColor = vec4(1.0); }}"
        )
        .expect("write");

        let skip = RendererConfig {
            fragment_shader: ShaderOrigin::File(file.path().to_path_buf()),
            ..RendererConfig::default()
        };
        let program = Orchestrator::new(&skip).prepare().expect("skip policy links");
        assert!(program.bindings().fill_color.is_none());

        let fail = RendererConfig {
            missing_uniform: MissingUniformPolicy::Fail,
            ..skip
        };
        let err = Orchestrator::new(&fail).prepare().unwrap_err();
        assert!(matches!(err, PipelineError::LinkFailure { .. }));
    }
}
