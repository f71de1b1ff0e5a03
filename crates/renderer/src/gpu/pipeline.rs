use std::borrow::Cow;
use std::collections::BTreeMap;
use std::num::NonZeroU64;

use crate::compile::CompiledShader;
use crate::error::PipelineError;
use crate::link::{LinkedProgram, ProgramBindings};
use crate::mesh::MeshGeometry;
use crate::runtime::DrawPlan;

use super::scoped;
use super::uniforms::UniformBlocks;
use super::MeshBuffer;

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// A linked program realised on the device: pipeline, bind groups, and the
/// uniform storage its bindings point into.
pub(crate) struct GpuProgram {
    pipeline: wgpu::RenderPipeline,
    bind_groups: Vec<wgpu::BindGroup>,
    uniforms: UniformBlocks,
    bindings: ProgramBindings,
}

impl GpuProgram {
    pub fn new(
        device: &wgpu::Device,
        program: &LinkedProgram,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, PipelineError> {
        let bindings = program.bindings().clone();
        let vertex_module = create_module(device, program.vertex())?;
        let fragment_module = create_module(device, program.fragment())?;
        let uniforms = UniformBlocks::new(device, &bindings.blocks)?;

        let (built, error) = scoped(device, wgpu::ErrorFilter::Validation, || {
            let layouts = build_group_layouts(device, &uniforms);
            let layout_refs = layouts.iter().collect::<Vec<_>>();
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("quad pipeline layout"),
                bind_group_layouts: &layout_refs,
                push_constant_ranges: &[],
            });

            let attributes = MeshGeometry::attributes(bindings.vertex_position.location);
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("quad pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex_module,
                    entry_point: Some("main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: MeshGeometry::stride(),
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: MeshGeometry::topology(),
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_module,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            });

            let bind_groups = build_bind_groups(device, &layouts, &uniforms);
            (pipeline, bind_groups)
        });
        if let Some(err) = error {
            return Err(PipelineError::link(err.to_string()));
        }
        let (pipeline, bind_groups) = built;

        tracing::debug!(
            groups = bind_groups.len(),
            blocks = bindings.blocks.len(),
            "realised shader program on device"
        );
        Ok(Self {
            pipeline,
            bind_groups,
            uniforms,
            bindings,
        })
    }

    /// Stages this frame's uniform values and pushes changed blocks.
    pub fn write_uniforms(&mut self, queue: &wgpu::Queue, draw: &DrawPlan) {
        let projection = draw.projection.to_cols_array();
        let model_view = draw.model_view.to_cols_array();
        self.uniforms
            .write(&self.bindings.projection, bytemuck::cast_slice(&projection));
        self.uniforms
            .write(&self.bindings.model_view, bytemuck::cast_slice(&model_view));
        if let Some(fill) = &self.bindings.fill_color {
            self.uniforms.write(fill, bytemuck::cast_slice(&draw.fill_color));
        }
        self.uniforms.flush(queue);
    }

    pub fn record(&self, pass: &mut wgpu::RenderPass<'_>, mesh: &MeshBuffer, vertex_count: u32) {
        pass.set_pipeline(&self.pipeline);
        for (index, group) in self.bind_groups.iter().enumerate() {
            pass.set_bind_group(index as u32, group, &[]);
        }
        pass.set_vertex_buffer(0, mesh.buffer.slice(..));
        pass.draw(0..vertex_count.min(mesh.vertex_count), 0..1);
    }
}

fn create_module(
    device: &wgpu::Device,
    shader: &CompiledShader,
) -> Result<wgpu::ShaderModule, PipelineError> {
    let stage = shader.stage();
    let (module, error) = scoped(device, wgpu::ErrorFilter::Validation, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(match stage {
                crate::types::ShaderStageKind::Vertex => "quad vertex",
                crate::types::ShaderStageKind::Fragment => "quad fragment",
            }),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(shader.source().to_owned()),
                stage: stage.naga_stage(),
                defines: &[],
            },
        })
    });
    match error {
        Some(err) => Err(PipelineError::compile(stage, err.to_string())),
        None => Ok(module),
    }
}

/// One layout per group index up to the highest group used; gaps get an
/// empty layout so group indices stay aligned with the shader.
fn build_group_layouts(device: &wgpu::Device, uniforms: &UniformBlocks) -> Vec<wgpu::BindGroupLayout> {
    let mut groups: BTreeMap<u32, Vec<wgpu::BindGroupLayoutEntry>> = BTreeMap::new();
    for (block, _) in uniforms.blocks() {
        groups
            .entry(block.group)
            .or_default()
            .push(wgpu::BindGroupLayoutEntry {
                binding: block.binding,
                visibility: block.visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(u64::from(block.size)),
                },
                count: None,
            });
    }

    let group_count = groups.keys().next_back().map_or(0, |last| last + 1);
    (0..group_count)
        .map(|group| {
            let entries = groups.get(&group).map(Vec::as_slice).unwrap_or(&[]);
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("uniform layout"),
                entries,
            })
        })
        .collect()
}

fn build_bind_groups(
    device: &wgpu::Device,
    layouts: &[wgpu::BindGroupLayout],
    uniforms: &UniformBlocks,
) -> Vec<wgpu::BindGroup> {
    layouts
        .iter()
        .enumerate()
        .map(|(group, layout)| {
            let entries = uniforms
                .blocks()
                .filter(|(block, _)| block.group == group as u32)
                .map(|(block, buffer)| wgpu::BindGroupEntry {
                    binding: block.binding,
                    resource: buffer.as_entire_binding(),
                })
                .collect::<Vec<_>>();
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniform bind group"),
                layout,
                entries: &entries,
            })
        })
        .collect()
}
