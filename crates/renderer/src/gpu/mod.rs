//! GPU backend for the quad pipeline.
//!
//! - `context` owns wgpu instance/device/surface wiring and reconfigures the
//!   swapchain when the window resizes.
//! - `pipeline` turns a [`LinkedProgram`](crate::link::LinkedProgram) into a
//!   render pipeline whose layout comes from the resolved bindings.
//! - `uniforms` keeps one buffer per reflected uniform block and writes values
//!   at their resolved offsets.
//! - `mesh` uploads the static vertex buffer.
//! - `state` glues everything together and implements
//!   [`RenderTarget`](crate::runtime::RenderTarget) for the window driver.
//!
//! Object creation runs inside wgpu error scopes so failures surface as
//! [`PipelineError`](crate::error::PipelineError) values instead of the
//! device's uncaptured-error panic.

mod context;
mod mesh;
mod pipeline;
mod state;
mod uniforms;

pub(crate) use context::GpuContext;
pub(crate) use mesh::MeshBuffer;
pub(crate) use pipeline::GpuProgram;
pub(crate) use state::GpuState;

/// Runs `create` inside an error scope and returns the first captured error.
pub(crate) fn scoped<T>(
    device: &wgpu::Device,
    filter: wgpu::ErrorFilter,
    create: impl FnOnce() -> T,
) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(filter);
    let value = create();
    let error = pollster::block_on(device.pop_error_scope());
    (value, error)
}
