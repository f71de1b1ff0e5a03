use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use tracing::{error, info, warn};

use crate::gpu::{GpuContext, GpuState};
use crate::orchestrator::Orchestrator;
use crate::runtime::{LoopSettings, RenderLoop};
use crate::types::RendererConfig;

/// Everything the event loop closure owns.
///
/// `gpu` is declared before `window` so the surface is dropped first.
struct WindowState {
    gpu: GpuState,
    render_loop: RenderLoop,
    window: Arc<Window>,
}

impl WindowState {
    fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let context = GpuContext::new(window.as_ref(), window.inner_size(), config.vsync)
            .context("failed to initialise rendering context")?;
        let (program, mesh) = Orchestrator::new(config)
            .start(&context)
            .context("failed to start shader pipeline")?;
        let settings = LoopSettings::from_config(config, mesh.vertex_count);
        let gpu = GpuState::new(context, program, mesh);

        Ok(Self {
            gpu,
            render_loop: RenderLoop::new(settings),
            window,
        })
    }

    fn redraw(&mut self) -> RedrawOutcome {
        let Err(err) = self.render_loop.tick(&mut self.gpu, self.window.as_ref()) else {
            return RedrawOutcome::Continue;
        };
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                warn!(error = %err, "surface needs reconfiguring");
                self.gpu.resize(self.gpu.size());
                RedrawOutcome::Continue
            }
            wgpu::SurfaceError::OutOfMemory => {
                error!("surface out of memory; stopping render loop");
                RedrawOutcome::Exit
            }
            wgpu::SurfaceError::Timeout => {
                warn!("surface timeout; retrying next frame");
                RedrawOutcome::Continue
            }
            other => {
                warn!(error = ?other, "surface error; retrying next frame");
                RedrawOutcome::Continue
            }
        }
    }
}

enum RedrawOutcome {
    Continue,
    Exit,
}

/// Opens the window, brings the pipeline up and runs the render loop until
/// the window closes.
pub(crate) fn run_window(config: RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let (width, height) = config.surface_size;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(PhysicalSize::new(width, height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, &config)?;
    info!(width, height, "entering render loop");
    state.window.request_redraw();

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);
            let Event::WindowEvent { window_id, event } = event else {
                return;
            };
            if window_id != state.window.id() {
                return;
            }
            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    info!(frames = state.render_loop.frame_count(), "window closed");
                    elwt.exit();
                }
                WindowEvent::Resized(new_size) => {
                    state.gpu.resize(new_size);
                }
                WindowEvent::RedrawRequested => {
                    if let RedrawOutcome::Exit = state.redraw() {
                        elwt.exit();
                    }
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}
