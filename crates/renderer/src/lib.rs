//! Renderer crate for chromaquad.
//!
//! The crate compiles a vertex/fragment shader pair, links it into a program,
//! uploads a quad and animates the clear color on every display refresh. The
//! overall flow is:
//!
//! ```text
//!   CLI / chromaquad
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ Orchestrator ──▶ compile ×2 ──▶ link ──▶ GpuProgram + MeshBuffer
//!                                                                  │
//!   winit event loop ──▶ RedrawRequested ──▶ RenderLoop::tick ◀────┘
//!          ▲                                      │
//!          └──────────── request_redraw ◀─────────┘
//! ```
//!
//! Compilation and linking are pure naga front-end work, so [`check`] can
//! validate a shader pair on machines without a GPU. Everything that touches
//! the device lives in the private `gpu` module; the render loop only sees it
//! through the [`RenderTarget`] trait.

mod animation;
mod compile;
mod error;
mod gpu;
mod link;
mod mesh;
mod orchestrator;
mod runtime;
mod types;
mod window;

use anyhow::Result;

pub use animation::{AnimationState, Channel, ColorRates, Direction, DEFAULT_FRAME_QUANTUM};
pub use compile::{compile, CompiledShader, FRAGMENT_SHADER_GLSL, VERTEX_SHADER_GLSL};
pub use error::PipelineError;
pub use link::{
    link, AttributeLocation, LinkedProgram, ProgramBindings, UniformBlock, UniformKind,
    UniformLocation, FILL_COLOR_UNIFORM, MODEL_VIEW_UNIFORM, PROJECTION_UNIFORM,
    VERTEX_POSITION_ATTRIBUTE,
};
pub use mesh::{MeshGeometry, Vertex, QUAD_VERTICES};
pub use orchestrator::Orchestrator;
pub use runtime::{
    projection, DrawPlan, FramePlan, FrameScheduler, LoopPhase, LoopSettings, RenderLoop,
    RenderTarget,
};
pub use types::{
    MissingUniformPolicy, RenderVariant, RendererConfig, ShaderOrigin, ShaderStageKind,
};

/// High-level entry point: opens the window and renders until it closes.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Brings the pipeline up and drives the winit event loop.
    ///
    /// Startup failures are returned before the first frame; once the loop
    /// is running this only returns when the window closes.
    pub fn run(self) -> Result<()> {
        window::run_window(self.config)
    }
}

/// Compiles and links the configured shader pair without opening a window.
pub fn check(config: &RendererConfig) -> Result<ProgramBindings, PipelineError> {
    Orchestrator::new(config)
        .prepare()
        .map(|program| program.bindings().clone())
}
