use glam::{Mat4, Vec3};

use crate::animation::{AnimationState, ColorRates};
use crate::types::{RenderVariant, RendererConfig};

/// Vertical field of view of the projection, in degrees.
pub const FIELD_OF_VIEW_DEGREES: f32 = 45.0;
pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 100.0;
/// Offset of the quad from the eye, applied to identity every frame.
pub const MODEL_TRANSLATION: Vec3 = Vec3::new(0.0, 0.0, -6.0);

/// Source of "call me again before the next repaint" requests.
///
/// The loop body never waits on its own; it asks the scheduler for another
/// frame and returns control to the host.
pub trait FrameScheduler {
    fn request_next_frame(&self);
}

impl FrameScheduler for winit::window::Window {
    fn request_next_frame(&self) {
        self.request_redraw();
    }
}

/// Something that can execute a [`FramePlan`].
pub trait RenderTarget {
    type Error;

    /// Current drawable size in physical pixels.
    fn viewport(&self) -> (u32, u32);

    fn submit(&mut self, plan: &FramePlan) -> Result<(), Self::Error>;
}

/// Draw parameters for the quad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawPlan {
    pub projection: Mat4,
    pub model_view: Mat4,
    /// Uploaded only when the program resolved a fill color uniform.
    pub fill_color: [f32; 4],
    pub vertex_count: u32,
}

/// Everything one frame needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    pub clear_color: [f64; 4],
    /// Depth clear value; `None` skips the depth attachment entirely.
    pub clear_depth: Option<f32>,
    pub draw: Option<DrawPlan>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    pub variant: RenderVariant,
    pub rates: ColorRates,
    pub frame_quantum: f64,
    pub vertex_count: u32,
}

impl LoopSettings {
    pub fn from_config(config: &RendererConfig, vertex_count: u32) -> Self {
        Self {
            variant: config.variant,
            rates: config.rates,
            frame_quantum: config.frame_quantum,
            vertex_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// Constructed but not yet ticked.
    Idle,
    /// Ticking once per scheduled frame.
    Running,
}

/// Per-frame driver: owns the animation state and nothing else mutable.
#[derive(Debug, Clone)]
pub struct RenderLoop {
    settings: LoopSettings,
    state: AnimationState,
    phase: LoopPhase,
    frame_count: u64,
}

impl RenderLoop {
    pub fn new(settings: LoopSettings) -> Self {
        Self::with_state(settings, AnimationState::new())
    }

    pub fn with_state(settings: LoopSettings, state: AnimationState) -> Self {
        Self {
            settings,
            state,
            phase: LoopPhase::Idle,
            frame_count: 0,
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Advances the animation one step and builds the frame for `viewport`.
    pub fn plan_frame(&mut self, viewport: (u32, u32)) -> FramePlan {
        self.state = self
            .state
            .advance(&self.settings.rates, self.settings.frame_quantum);
        self.frame_count = self.frame_count.saturating_add(1);

        let clear_color = self.state.clear_color();
        match self.settings.variant {
            RenderVariant::ClearOnly => FramePlan {
                clear_color,
                clear_depth: None,
                draw: None,
            },
            RenderVariant::Full => FramePlan {
                clear_color,
                clear_depth: Some(1.0),
                draw: Some(DrawPlan {
                    projection: projection(viewport),
                    model_view: Mat4::from_translation(MODEL_TRANSLATION),
                    fill_color: self.state.inverse_color(),
                    vertex_count: self.settings.vertex_count,
                }),
            },
        }
    }

    /// Runs one iteration: plan, submit, then request the next frame.
    ///
    /// The next frame is requested even when submission fails; the host
    /// decides whether the error ends the loop.
    pub fn tick<T, S>(&mut self, target: &mut T, scheduler: &S) -> Result<(), T::Error>
    where
        T: RenderTarget,
        S: FrameScheduler + ?Sized,
    {
        if self.phase == LoopPhase::Idle {
            tracing::debug!(variant = ?self.settings.variant, "render loop running");
            self.phase = LoopPhase::Running;
        }

        let plan = self.plan_frame(target.viewport());
        tracing::trace!(
            frame = self.frame_count,
            red = plan.clear_color[0],
            green = plan.clear_color[1],
            blue = plan.clear_color[2],
            "frame planned"
        );
        let result = target.submit(&plan);
        scheduler.request_next_frame();
        result
    }
}

/// Perspective projection for a `width x height` viewport.
pub fn projection(viewport: (u32, u32)) -> Mat4 {
    let (width, height) = viewport;
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    Mat4::perspective_rh(FIELD_OF_VIEW_DEGREES.to_radians(), aspect, Z_NEAR, Z_FAR)
}
