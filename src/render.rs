//! Per-frame command recording: pass setup, scene drawing and blits.

use std::iter;

use crate::context::Context;
use crate::data_structures::framebuffer::{DEPTH_FORMAT, Framebuffer};
use crate::data_structures::scene_graph::{NodeId, NodeKind, Scene};

/// Where a render pass draws to.
pub enum PassTarget<'a> {
    /// The window surface with the context's default depth target.
    Surface,
    /// An off-screen framebuffer, generated on first use.
    Framebuffer(&'a mut Framebuffer),
}

impl PassTarget<'_> {
    /// Color format, depth format and sample count of this target, as
    /// needed for pipeline selection.
    pub fn formats(
        &self,
        ctx: &Context,
    ) -> (wgpu::TextureFormat, Option<wgpu::TextureFormat>, u32) {
        match self {
            Self::Surface => (ctx.config.format, Some(DEPTH_FORMAT), 1),
            Self::Framebuffer(fb) => (
                fb.color_format(0)
                    .unwrap_or(wgpu::TextureFormat::Rgba8UnormSrgb),
                Some(DEPTH_FORMAT),
                fb.samples,
            ),
        }
    }
}

/// One frame's worth of command recording against an acquired surface
/// texture. Dropping the frame without [`finish`](Self::finish) discards the
/// recorded work.
pub struct Frame {
    output: wgpu::SurfaceTexture,
    surface_view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}

impl Frame {
    pub fn new(ctx: &Context) -> Result<Self, wgpu::SurfaceError> {
        let output = ctx.surface.get_current_texture()?;
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        Ok(Self {
            output,
            surface_view,
            encoder,
        })
    }

    /// Begin a render pass on `target`. `clear` loads the color attachment
    /// with the given color instead of the previous contents; `clear_depth`
    /// does the same for depth at 1.0.
    pub fn pass<'e>(
        &'e mut self,
        ctx: &Context,
        mut target: PassTarget<'_>,
        clear: Option<wgpu::Color>,
        clear_depth: bool,
    ) -> wgpu::RenderPass<'e> {
        if let PassTarget::Framebuffer(fb) = &mut target {
            fb.generate(&ctx.device, &ctx.queue);
        }
        let (color_view, depth_view) = match &target {
            PassTarget::Surface => (
                &self.surface_view,
                ctx.depth.view().expect("context depth target"),
            ),
            PassTarget::Framebuffer(fb) => (
                fb.color_view(0).expect("framebuffer color attachment"),
                fb.depth_view().expect("framebuffer depth attachment"),
            ),
        };
        self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("render pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: match clear {
                        Some(color) => wgpu::LoadOp::Clear(color),
                        None => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: if clear_depth {
                        wgpu::LoadOp::Clear(1.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        })
    }

    /// Copy the color contents of `src` into `dst`. A multisampled source
    /// resolves into a single-sampled destination; otherwise this is a
    /// plain texture copy over the overlapping region.
    pub fn blit(&mut self, src: &Framebuffer, dst: &Framebuffer) {
        let (Some(src_view), Some(dst_view)) = (src.color_view(0), dst.color_view(0)) else {
            log::error!("blit with an ungenerated framebuffer");
            return;
        };
        if src.samples > 1 && dst.samples == 1 {
            // A load/store pass with a resolve target performs the
            // multisample resolve without drawing anything.
            self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("resolve blit"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: src_view,
                    resolve_target: Some(dst_view),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            return;
        }
        if src.samples != dst.samples {
            log::error!(
                "blit between incompatible sample counts {}x and {}x",
                src.samples,
                dst.samples
            );
            return;
        }
        let (Some(src_tex), Some(dst_tex)) = (attachment_texture(src), attachment_texture(dst))
        else {
            log::error!("blit requires texture color attachments on both sides");
            return;
        };
        let extent = wgpu::Extent3d {
            width: src.extent.width.min(dst.extent.width),
            height: src.extent.height.min(dst.extent.height),
            depth_or_array_layers: 1,
        };
        self.encoder.copy_texture_to_texture(
            src_tex.as_image_copy(),
            dst_tex.as_image_copy(),
            extent,
        );
    }

    /// Submit the recorded commands and present the surface.
    pub fn finish(self, ctx: &Context) {
        ctx.queue.submit(iter::once(self.encoder.finish()));
        self.output.present();
    }
}

fn attachment_texture(fb: &Framebuffer) -> Option<&wgpu::Texture> {
    use crate::data_structures::framebuffer::{AttachmentSlot, AttachmentTarget};
    match fb.attachment(AttachmentSlot::Color(0))? {
        AttachmentTarget::Texture(t) => t.gpu().map(|g| &g.texture),
        AttachmentTarget::Renderbuffer(_) => None,
    }
}

/// Draw every enabled mesh node of `scene` from `camera`'s point of view.
///
/// For each mesh the world matrix is resolved, written into the material's
/// `u_model`/`u_view`/`u_proj` uniforms, the material is bound and the
/// geometry drawn. Meshes whose shader failed to link are skipped.
pub fn draw_scene(
    ctx: &mut Context,
    pass: &mut wgpu::RenderPass<'_>,
    scene: &mut Scene,
    camera: NodeId,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    samples: u32,
) {
    let view = scene.view_matrix(camera);
    let proj = match &scene.node(camera).kind {
        NodeKind::Camera(data) => data.projection(),
        _ => {
            log::error!("draw_scene called with a non-camera node");
            return;
        }
    };

    let ids: Vec<NodeId> = scene.node_ids().collect();
    for id in ids {
        if !scene.is_enabled(id) {
            continue;
        }
        if !matches!(scene.node(id).kind, NodeKind::Mesh(_)) {
            continue;
        }
        let model = scene.world_matrix(id);

        let Context {
            device,
            queue,
            render_state,
            ..
        } = ctx;
        let NodeKind::Mesh(mesh) = &mut scene.node_mut(id).kind else {
            continue;
        };
        mesh.material.uniforms.set_mat4("u_model", model);
        mesh.material.uniforms.set_mat4("u_proj", proj);
        mesh.material.uniforms.set_mat4("u_view", view);

        let topology = mesh.geometry.topology;
        if !mesh.material.bind(
            device,
            queue,
            pass,
            render_state,
            topology,
            color_format,
            depth_format,
            samples,
        ) {
            continue;
        }

        mesh.geometry.ensure_generated(device);
        let buffers = mesh.geometry.buffers().expect("generated geometry");
        pass.set_vertex_buffer(0, buffers.vertex.slice(..));
        match &buffers.index {
            Some(index) => {
                pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.geometry.draw_count(), 0, 0..1);
            }
            None => pass.draw(0..mesh.geometry.draw_count(), 0..1),
        }
        mesh.material.unbind(render_state);
    }
}
