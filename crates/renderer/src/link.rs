//! Program linking: pairs a vertex and fragment stage, checks that their
//! interfaces agree, and resolves the named bindings the render loop feeds.
//!
//! Resolution works on the reflected naga modules, so a program can be linked
//! and inspected without a GPU. Locations are what the GPU backend needs to
//! lay out vertex buffers and uniform blocks:
//! - attributes resolve to a shader input location,
//! - uniforms resolve to `(group, binding, byte offset)` inside a uniform block.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use wgpu::naga::{self, AddressSpace, Binding, ScalarKind, TypeInner, VectorSize};

use crate::compile::CompiledShader;
use crate::error::PipelineError;
use crate::types::{MissingUniformPolicy, ShaderStageKind};

pub const VERTEX_POSITION_ATTRIBUTE: &str = "aVertexPosition";
pub const MODEL_VIEW_UNIFORM: &str = "uMVP";
pub const PROJECTION_UNIFORM: &str = "uProjMat";
pub const FILL_COLOR_UNIFORM: &str = "uColor";

const ENTRY_POINT: &str = "main";

/// Value types the render loop knows how to upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Mat4,
    Vec4,
}

impl UniformKind {
    pub fn size(self) -> u32 {
        match self {
            UniformKind::Mat4 => 64,
            UniformKind::Vec4 => 16,
        }
    }

    fn of(inner: &TypeInner) -> Option<Self> {
        match *inner {
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                scalar,
            } if scalar.kind == ScalarKind::Float && scalar.width == 4 => Some(UniformKind::Mat4),
            TypeInner::Vector {
                size: VectorSize::Quad,
                scalar,
            } if scalar.kind == ScalarKind::Float && scalar.width == 4 => Some(UniformKind::Vec4),
            _ => None,
        }
    }
}

/// Resolved location of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeLocation {
    pub location: u32,
    /// Number of float components the shader declares (2 to 4).
    pub components: u32,
}

/// Resolved location of a uniform value inside a uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation {
    pub group: u32,
    pub binding: u32,
    pub offset: u32,
    pub kind: UniformKind,
}

/// A uniform block referenced by either stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformBlock {
    pub group: u32,
    pub binding: u32,
    pub size: u32,
    pub visibility: wgpu::ShaderStages,
}

/// Everything the render loop binds by name.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramBindings {
    pub vertex_position: AttributeLocation,
    pub model_view: UniformLocation,
    pub projection: UniformLocation,
    /// `None` when the program has no fill color and the policy allowed it.
    pub fill_color: Option<UniformLocation>,
    pub blocks: Vec<UniformBlock>,
}

/// A vertex+fragment pair whose interface checked out and whose bindings
/// resolved. There is no partially linked state: [`link`] either returns this
/// or an error.
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    vertex: CompiledShader,
    fragment: CompiledShader,
    bindings: ProgramBindings,
}

impl LinkedProgram {
    pub fn vertex(&self) -> &CompiledShader {
        &self.vertex
    }

    pub fn fragment(&self) -> &CompiledShader {
        &self.fragment
    }

    pub fn bindings(&self) -> &ProgramBindings {
        &self.bindings
    }
}

/// Links two compiled stages into a program.
pub fn link(
    vertex: CompiledShader,
    fragment: CompiledShader,
    policy: MissingUniformPolicy,
) -> Result<LinkedProgram, PipelineError> {
    expect_stage(&vertex, ShaderStageKind::Vertex, "vertex")?;
    expect_stage(&fragment, ShaderStageKind::Fragment, "fragment")?;
    let vertex_entry = entry_point(&vertex)?;
    let fragment_entry = entry_point(&fragment)?;

    check_varyings(&vertex, vertex_entry, &fragment, fragment_entry)?;
    let blocks = merge_blocks(&vertex, &fragment)?;

    let vertex_position = resolve_attribute(&vertex, vertex_entry, VERTEX_POSITION_ATTRIBUTE)?
        .ok_or_else(|| {
            PipelineError::link(format!(
                "active attribute `{VERTEX_POSITION_ATTRIBUTE}` not found in vertex stage"
            ))
        })?;

    let model_view = require_uniform(&vertex, &fragment, MODEL_VIEW_UNIFORM, UniformKind::Mat4)?;
    let projection = require_uniform(&vertex, &fragment, PROJECTION_UNIFORM, UniformKind::Mat4)?;
    let fill_color = match resolve_uniform(&vertex, &fragment, FILL_COLOR_UNIFORM, UniformKind::Vec4)? {
        Some(location) => Some(location),
        None => match policy {
            MissingUniformPolicy::Skip => {
                tracing::warn!(
                    uniform = FILL_COLOR_UNIFORM,
                    "optional uniform not found; its upload will be skipped"
                );
                None
            }
            MissingUniformPolicy::Fail => {
                return Err(PipelineError::link(format!(
                    "uniform `{FILL_COLOR_UNIFORM}` not found and missing uniforms are not allowed"
                )));
            }
        },
    };

    let bindings = ProgramBindings {
        vertex_position,
        model_view,
        projection,
        fill_color,
        blocks,
    };
    tracing::debug!(?bindings, "linked shader program");

    Ok(LinkedProgram {
        vertex,
        fragment,
        bindings,
    })
}

fn expect_stage(
    shader: &CompiledShader,
    expected: ShaderStageKind,
    slot: &str,
) -> Result<(), PipelineError> {
    if shader.stage() == expected {
        Ok(())
    } else {
        Err(PipelineError::link(format!(
            "{slot} slot holds a {} shader; expected a {expected} shader",
            shader.stage()
        )))
    }
}

fn entry_point(shader: &CompiledShader) -> Result<&naga::EntryPoint, PipelineError> {
    shader
        .module()
        .entry_points
        .iter()
        .find(|entry| {
            entry.name == ENTRY_POINT
                && ShaderStageKind::from_naga(entry.stage) == Some(shader.stage())
        })
        .ok_or_else(|| {
            PipelineError::link(format!(
                "{} shader has no `{ENTRY_POINT}` entry point",
                shader.stage()
            ))
        })
}

/// A location-bound value crossing a stage boundary.
struct InterfaceSlot<'a> {
    name: Option<&'a str>,
    location: u32,
    ty: &'a TypeInner,
}

fn collect_slots<'a>(
    module: &'a naga::Module,
    name: Option<&'a str>,
    ty: naga::Handle<naga::Type>,
    binding: Option<&'a Binding>,
    out: &mut Vec<InterfaceSlot<'a>>,
) {
    let inner = &module.types[ty].inner;
    match binding {
        Some(Binding::Location { location, .. }) => out.push(InterfaceSlot {
            name,
            location: *location,
            ty: inner,
        }),
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = inner {
                for member in members {
                    collect_slots(
                        module,
                        member.name.as_deref(),
                        member.ty,
                        member.binding.as_ref(),
                        out,
                    );
                }
            }
        }
    }
}

fn inputs<'a>(module: &'a naga::Module, entry: &'a naga::EntryPoint) -> Vec<InterfaceSlot<'a>> {
    let mut slots = Vec::new();
    for argument in &entry.function.arguments {
        collect_slots(
            module,
            argument.name.as_deref(),
            argument.ty,
            argument.binding.as_ref(),
            &mut slots,
        );
    }
    slots
}

fn outputs<'a>(module: &'a naga::Module, entry: &'a naga::EntryPoint) -> Vec<InterfaceSlot<'a>> {
    let mut slots = Vec::new();
    if let Some(result) = &entry.function.result {
        collect_slots(module, None, result.ty, result.binding.as_ref(), &mut slots);
    }
    slots
}

fn check_varyings(
    vertex: &CompiledShader,
    vertex_entry: &naga::EntryPoint,
    fragment: &CompiledShader,
    fragment_entry: &naga::EntryPoint,
) -> Result<(), PipelineError> {
    let produced = outputs(vertex.module(), vertex_entry);
    let mut log = String::new();

    for input in inputs(fragment.module(), fragment_entry) {
        let label = input.name.unwrap_or("<unnamed>");
        match produced.iter().find(|output| output.location == input.location) {
            None => {
                let _ = writeln!(
                    log,
                    "fragment input `{label}` at location {} is not written by the vertex stage",
                    input.location
                );
            }
            Some(output) if output.ty != input.ty => {
                let _ = writeln!(
                    log,
                    "fragment input `{label}` at location {} has type {:?} but the vertex stage writes {:?}",
                    input.location, input.ty, output.ty
                );
            }
            Some(_) => {}
        }
    }

    if log.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::link(log))
    }
}

/// A uniform block plus a module-independent description of its members.
struct ReflectedBlock {
    block: UniformBlock,
    layout: String,
}

/// Renders `ty` without naga handles so layouts from two modules compare.
fn describe_type(module: &naga::Module, ty: naga::Handle<naga::Type>) -> String {
    match &module.types[ty].inner {
        TypeInner::Array { base, size, stride } => {
            format!("array<{}, {size:?}, stride {stride}>", describe_type(module, *base))
        }
        TypeInner::Struct { members, span } => {
            let fields = members
                .iter()
                .map(|member| {
                    format!(
                        "{} @{}: {}",
                        member.name.as_deref().unwrap_or("_"),
                        member.offset,
                        describe_type(module, member.ty)
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{ {fields} }} ({span} bytes)")
        }
        other => format!("{other:?}"),
    }
}

fn uniform_blocks(shader: &CompiledShader) -> Vec<ReflectedBlock> {
    let module = shader.module();
    let visibility = match shader.stage() {
        ShaderStageKind::Vertex => wgpu::ShaderStages::VERTEX,
        ShaderStageKind::Fragment => wgpu::ShaderStages::FRAGMENT,
    };

    let mut blocks = Vec::new();
    for (_, global) in module.global_variables.iter() {
        if global.space != AddressSpace::Uniform {
            continue;
        }
        let Some(binding) = &global.binding else {
            continue;
        };
        let inner = &module.types[global.ty].inner;
        let (size, layout) = match inner {
            TypeInner::Struct { span, .. } => (*span, describe_type(module, global.ty)),
            other => match UniformKind::of(other) {
                Some(kind) => (
                    kind.size(),
                    format!(
                        "{}: {}",
                        global.name.as_deref().unwrap_or("_"),
                        describe_type(module, global.ty)
                    ),
                ),
                None => {
                    tracing::debug!(
                        name = ?global.name,
                        group = binding.group,
                        binding = binding.binding,
                        "ignoring uniform of unsupported type"
                    );
                    continue;
                }
            },
        };
        blocks.push(ReflectedBlock {
            block: UniformBlock {
                group: binding.group,
                binding: binding.binding,
                size,
                visibility,
            },
            layout,
        });
    }
    blocks
}

/// Blocks visible to both stages at the same (group, binding) must agree on
/// size and on every member's name, offset and type.
fn merge_blocks(
    vertex: &CompiledShader,
    fragment: &CompiledShader,
) -> Result<Vec<UniformBlock>, PipelineError> {
    let mut merged: BTreeMap<(u32, u32), ReflectedBlock> = BTreeMap::new();
    for reflected in uniform_blocks(vertex)
        .into_iter()
        .chain(uniform_blocks(fragment))
    {
        let block = reflected.block;
        match merged.get_mut(&(block.group, block.binding)) {
            Some(existing) if existing.block.size != block.size => {
                return Err(PipelineError::link(format!(
                    "uniform block at group {} binding {} is {} bytes in one stage and {} bytes in the other",
                    block.group, block.binding, existing.block.size, block.size
                )));
            }
            Some(existing) if existing.layout != reflected.layout => {
                return Err(PipelineError::link(format!(
                    "uniform block at group {} binding {} has mismatched layouts:\n  {}\n  {}",
                    block.group, block.binding, existing.layout, reflected.layout
                )));
            }
            Some(existing) => existing.block.visibility |= block.visibility,
            None => {
                merged.insert((block.group, block.binding), reflected);
            }
        }
    }
    Ok(merged.into_values().map(|reflected| reflected.block).collect())
}

fn resolve_attribute(
    shader: &CompiledShader,
    entry: &naga::EntryPoint,
    name: &str,
) -> Result<Option<AttributeLocation>, PipelineError> {
    let module = shader.module();
    let slots = inputs(module, entry);

    let slot = match slots.iter().find(|slot| slot.name == Some(name)) {
        Some(slot) => Some(slot),
        None => {
            // Entry arguments may be anonymous; fall back to the named global
            // the frontend copies them into and match it by type.
            let global_ty = module
                .global_variables
                .iter()
                .find(|(_, global)| global.name.as_deref() == Some(name))
                .map(|(_, global)| &module.types[global.ty].inner);
            match global_ty {
                Some(ty) => {
                    let mut candidates = slots.iter().filter(|slot| slot.ty == ty);
                    match (candidates.next(), candidates.next()) {
                        (Some(slot), None) => Some(slot),
                        _ => None,
                    }
                }
                None => None,
            }
        }
    };

    let Some(slot) = slot else {
        return Ok(None);
    };

    let components = match *slot.ty {
        TypeInner::Vector { size, scalar }
            if scalar.kind == ScalarKind::Float && scalar.width == 4 =>
        {
            size as u32
        }
        ref other => {
            return Err(PipelineError::link(format!(
                "attribute `{name}` has type {other:?}; expected a float vector"
            )));
        }
    };

    Ok(Some(AttributeLocation {
        location: slot.location,
        components,
    }))
}

fn find_uniform(shader: &CompiledShader, name: &str) -> Option<(naga::ResourceBinding, u32, TypeInner)> {
    let module = shader.module();
    for (_, global) in module.global_variables.iter() {
        if global.space != AddressSpace::Uniform {
            continue;
        }
        let Some(binding) = &global.binding else {
            continue;
        };
        let inner = &module.types[global.ty].inner;
        if global.name.as_deref() == Some(name) {
            return Some((binding.clone(), 0, inner.clone()));
        }
        if let TypeInner::Struct { members, .. } = inner {
            if let Some(member) = members.iter().find(|member| member.name.as_deref() == Some(name)) {
                let member_inner = module.types[member.ty].inner.clone();
                return Some((binding.clone(), member.offset, member_inner));
            }
        }
    }
    None
}

fn resolve_uniform(
    vertex: &CompiledShader,
    fragment: &CompiledShader,
    name: &str,
    expected: UniformKind,
) -> Result<Option<UniformLocation>, PipelineError> {
    let found = [vertex, fragment]
        .into_iter()
        .filter_map(|shader| find_uniform(shader, name))
        .collect::<Vec<_>>();

    let Some((binding, offset, inner)) = found.first() else {
        return Ok(None);
    };
    if found
        .iter()
        .any(|(other_binding, other_offset, _)| other_binding != binding || other_offset != offset)
    {
        return Err(PipelineError::link(format!(
            "uniform `{name}` resolves to different locations in the vertex and fragment stages"
        )));
    }

    match UniformKind::of(inner) {
        Some(kind) if kind == expected => Ok(Some(UniformLocation {
            group: binding.group,
            binding: binding.binding,
            offset: *offset,
            kind,
        })),
        _ => Err(PipelineError::link(format!(
            "uniform `{name}` has type {inner:?}; expected {expected:?}"
        ))),
    }
}

fn require_uniform(
    vertex: &CompiledShader,
    fragment: &CompiledShader,
    name: &str,
    expected: UniformKind,
) -> Result<UniformLocation, PipelineError> {
    resolve_uniform(vertex, fragment, name, expected)?
        .ok_or_else(|| PipelineError::link(format!("active uniform `{name}` not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{compile, FRAGMENT_SHADER_GLSL, VERTEX_SHADER_GLSL};

    const SOLID_FRAGMENT: &str = r"#version 450
layout(location = 0) out vec4 fragColor;
void main() {
    fragColor = vec4(1.0, 0.0, 1.0, 1.0);
}
";

    fn vertex() -> CompiledShader {
        compile(ShaderStageKind::Vertex, VERTEX_SHADER_GLSL).expect("vertex")
    }

    fn fragment(source: &str) -> CompiledShader {
        compile(ShaderStageKind::Fragment, source).expect("fragment")
    }

    #[test]
    fn resolves_builtin_bindings() {
        let program = link(
            vertex(),
            fragment(FRAGMENT_SHADER_GLSL),
            MissingUniformPolicy::Fail,
        )
        .expect("link");
        let bindings = program.bindings();

        assert_eq!(bindings.vertex_position.location, 0);
        assert_eq!(bindings.vertex_position.components, 2);

        assert_eq!((bindings.model_view.group, bindings.model_view.binding), (0, 0));
        assert_eq!(bindings.model_view.offset, 0);
        assert_eq!(bindings.model_view.kind, UniformKind::Mat4);
        assert_eq!((bindings.projection.group, bindings.projection.binding), (0, 0));
        assert_eq!(bindings.projection.offset, 64);

        let fill = bindings.fill_color.expect("fill color");
        assert_eq!((fill.group, fill.binding, fill.offset), (0, 1, 0));
        assert_eq!(fill.kind, UniformKind::Vec4);

        assert_eq!(bindings.blocks.len(), 2);
        assert_eq!(bindings.blocks[0].size, 128);
        assert_eq!(bindings.blocks[0].visibility, wgpu::ShaderStages::VERTEX);
        assert_eq!(bindings.blocks[1].size, 16);
        assert_eq!(bindings.blocks[1].visibility, wgpu::ShaderStages::FRAGMENT);
    }

    #[test]
    fn two_vertex_stages_fail_to_link() {
        let err = link(vertex(), vertex(), MissingUniformPolicy::Skip).unwrap_err();
        assert!(matches!(err, PipelineError::LinkFailure { .. }));
        assert!(err.log().is_some_and(|log| log.contains("fragment slot")));
    }

    #[test]
    fn swapped_stages_fail_to_link() {
        let err = link(
            fragment(FRAGMENT_SHADER_GLSL),
            vertex(),
            MissingUniformPolicy::Skip,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::LinkFailure { .. }));
    }

    #[test]
    fn missing_fill_color_is_skipped_by_default_policy() {
        let program = link(vertex(), fragment(SOLID_FRAGMENT), MissingUniformPolicy::Skip)
            .expect("link");
        assert!(program.bindings().fill_color.is_none());
        assert_eq!(program.bindings().blocks.len(), 1);
    }

    #[test]
    fn missing_fill_color_fails_under_strict_policy() {
        let err = link(vertex(), fragment(SOLID_FRAGMENT), MissingUniformPolicy::Fail)
            .unwrap_err();
        assert!(matches!(err, PipelineError::LinkFailure { .. }));
        assert!(err.log().is_some_and(|log| log.contains(FILL_COLOR_UNIFORM)));
    }

    #[test]
    fn missing_required_uniform_fails() {
        let source = r"#version 450
layout(location = 0) in vec2 aVertexPosition;
layout(std140, set = 0, binding = 0) uniform Transforms {
    mat4 uMVP;
} transforms;
void main() {
    gl_Position = transforms.uMVP * vec4(aVertexPosition, 0.0, 1.0);
}
";
        let vertex = compile(ShaderStageKind::Vertex, source).expect("vertex");
        let err = link(vertex, fragment(FRAGMENT_SHADER_GLSL), MissingUniformPolicy::Skip)
            .unwrap_err();
        assert!(err.log().is_some_and(|log| log.contains(PROJECTION_UNIFORM)));
    }

    #[test]
    fn unwritten_fragment_input_fails() {
        let source = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 fragColor;
void main() {
    fragColor = vec4(v_uv, 0.0, 1.0);
}
";
        let err = link(vertex(), fragment(source), MissingUniformPolicy::Skip).unwrap_err();
        assert!(matches!(err, PipelineError::LinkFailure { .. }));
        assert!(err.log().is_some_and(|log| log.contains("location 0")));
    }

    #[test]
    fn shared_block_with_different_layout_fails() {
        let source = r"#version 450
layout(location = 0) out vec4 fragColor;
layout(std140, set = 0, binding = 0) uniform Other {
    vec4 uColor;
    vec4 pad[7];
} other;
void main() {
    fragColor = other.uColor;
}
";
        let err = link(vertex(), fragment(source), MissingUniformPolicy::Fail).unwrap_err();
        assert!(matches!(err, PipelineError::LinkFailure { .. }));
        let log = err.log().unwrap_or_default();
        assert!(log.contains("binding 0"), "{log}");
        assert!(log.contains(FILL_COLOR_UNIFORM), "{log}");
        assert!(log.contains(MODEL_VIEW_UNIFORM), "{log}");
    }

    #[test]
    fn shared_block_with_identical_layout_merges_visibility() {
        let source = r"#version 450
layout(location = 0) out vec4 fragColor;
layout(std140, set = 0, binding = 0) uniform Transforms {
    mat4 uMVP;
    mat4 uProjMat;
} transforms;
layout(std140, set = 0, binding = 1) uniform Fill {
    vec4 uColor;
} fill;
void main() {
    fragColor = fill.uColor * transforms.uMVP[0].x;
}
";
        let program = link(vertex(), fragment(source), MissingUniformPolicy::Fail).expect("link");
        let shared = program.bindings().blocks[0];
        assert_eq!((shared.group, shared.binding), (0, 0));
        assert_eq!(
            shared.visibility,
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT
        );
    }

    #[test]
    fn uniform_of_wrong_kind_fails() {
        let source = r"#version 450
layout(location = 0) out vec4 fragColor;
layout(std140, set = 0, binding = 1) uniform Fill {
    mat4 uColor;
} fill;
void main() {
    fragColor = fill.uColor[0];
}
";
        let err = link(vertex(), fragment(source), MissingUniformPolicy::Skip).unwrap_err();
        assert!(matches!(err, PipelineError::LinkFailure { .. }));
        assert!(err.log().is_some_and(|log| log.contains(FILL_COLOR_UNIFORM)));
    }

    #[test]
    fn uniform_at_different_locations_across_stages_fails() {
        let source = r"#version 450
layout(location = 0) out vec4 fragColor;
layout(std140, set = 0, binding = 2) uniform Extra {
    mat4 uMVP;
} extra;
void main() {
    fragColor = extra.uMVP[0];
}
";
        let err = link(vertex(), fragment(source), MissingUniformPolicy::Skip).unwrap_err();
        assert!(matches!(err, PipelineError::LinkFailure { .. }));
        assert!(err.log().is_some_and(|log| log.contains(MODEL_VIEW_UNIFORM)));
    }
}
