use winit::dpi::PhysicalSize;

use crate::runtime::{FramePlan, RenderTarget};

use super::pipeline::DEPTH_FORMAT;
use super::{GpuContext, GpuProgram, MeshBuffer};

struct DepthTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthTarget {
    fn new(device: &wgpu::Device, size: PhysicalSize<u32>) -> Self {
        let extent = wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// Device, surface, and the realised program for one window.
pub(crate) struct GpuState {
    context: GpuContext,
    program: GpuProgram,
    mesh: MeshBuffer,
    depth: DepthTarget,
}

impl GpuState {
    pub(crate) fn new(context: GpuContext, program: GpuProgram, mesh: MeshBuffer) -> Self {
        let depth = DepthTarget::new(&context.device, context.size);
        Self {
            context,
            program,
            mesh,
            depth,
        }
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.depth = DepthTarget::new(&self.context.device, new_size);
        tracing::debug!(width = new_size.width, height = new_size.height, "surface resized");
    }
}

impl RenderTarget for GpuState {
    type Error = wgpu::SurfaceError;

    fn viewport(&self) -> (u32, u32) {
        (self.context.config.width, self.context.config.height)
    }

    fn submit(&mut self, plan: &FramePlan) -> Result<(), Self::Error> {
        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        if let Some(draw) = &plan.draw {
            self.program.write_uniforms(&self.context.queue, draw);
        }

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        {
            let [r, g, b, a] = plan.clear_color;
            let depth_stencil_attachment =
                plan.clear_depth
                    .map(|depth| wgpu::RenderPassDepthStencilAttachment {
                        view: &self.depth.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(depth),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    });
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quad pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            // The pipeline declares a depth format, so it may only be bound
            // when the pass carries a depth attachment.
            if let (Some(draw), Some(_)) = (&plan.draw, plan.clear_depth) {
                self.program
                    .record(&mut render_pass, &self.mesh, draw.vertex_count);
            }
        }

        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}
