//! Off-screen render targets composed of texture and renderbuffer
//! attachments.
//!
//! Attachments may be configured up front or left to the framebuffer, which
//! fills in missing ones at generation time with targets matching its own
//! extent and sample count. Mismatched pre-configured attachments are kept
//! and reported, not rejected.

use std::collections::BTreeMap;

use crate::data_structures::Extent2d;
use crate::data_structures::texture::{Texture, TextureConfig, TextureKind};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Attachment point of a framebuffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AttachmentSlot {
    Color(u32),
    Depth,
}

/// A render-only target. Unlike a [`Texture`] it can never be sampled, the
/// underlying allocation has no `TEXTURE_BINDING` usage.
#[derive(Debug)]
pub struct Renderbuffer {
    pub extent: Extent2d,
    pub format: wgpu::TextureFormat,
    pub samples: u32,
    gpu: Option<(wgpu::Texture, wgpu::TextureView)>,
}

impl Renderbuffer {
    pub fn new(format: wgpu::TextureFormat, samples: u32) -> Self {
        Self {
            extent: Extent2d::default(),
            format,
            samples,
            gpu: None,
        }
    }

    pub fn is_generated(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn generate(&mut self, device: &wgpu::Device) {
        if self.gpu.is_some() {
            return;
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("renderbuffer"),
            size: wgpu::Extent3d {
                width: self.extent.width.max(1),
                height: self.extent.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: self.samples.max(1),
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.gpu = Some((texture, view));
    }

    pub fn resize(&mut self, device: &wgpu::Device, extent: Extent2d) {
        self.extent = extent;
        if self.gpu.is_some() {
            self.gpu = None;
            self.generate(device);
        }
    }

    pub fn view(&self) -> Option<&wgpu::TextureView> {
        self.gpu.as_ref().map(|(_, view)| view)
    }
}

/// A texture or renderbuffer plugged into an attachment slot.
#[derive(Debug)]
pub enum AttachmentTarget {
    Texture(Texture),
    Renderbuffer(Renderbuffer),
}

impl AttachmentTarget {
    fn is_generated(&self) -> bool {
        match self {
            Self::Texture(t) => t.is_generated(),
            Self::Renderbuffer(r) => r.is_generated(),
        }
    }

    fn extent(&self) -> Extent2d {
        match self {
            Self::Texture(t) => t.extent,
            Self::Renderbuffer(r) => r.extent,
        }
    }

    fn samples(&self) -> u32 {
        match self {
            Self::Texture(t) => t.config.samples,
            Self::Renderbuffer(r) => r.samples,
        }
    }

    pub fn view(&self) -> Option<&wgpu::TextureView> {
        match self {
            Self::Texture(t) => t.view(),
            Self::Renderbuffer(r) => r.view(),
        }
    }
}

#[derive(Debug)]
pub struct Framebuffer {
    pub extent: Extent2d,
    pub samples: u32,
    attachments: BTreeMap<AttachmentSlot, AttachmentTarget>,
    generated: bool,
}

impl Framebuffer {
    pub fn new(extent: Extent2d, samples: u32) -> Self {
        Self {
            extent,
            samples: samples.max(1),
            attachments: BTreeMap::new(),
            generated: false,
        }
    }

    /// Plug a target into a slot before generation. Replaces any previous
    /// target in that slot.
    pub fn attach(&mut self, slot: AttachmentSlot, target: AttachmentTarget) {
        self.attachments.insert(slot, target);
    }

    pub fn attachment(&self, slot: AttachmentSlot) -> Option<&AttachmentTarget> {
        self.attachments.get(&slot)
    }

    pub fn attachment_mut(&mut self, slot: AttachmentSlot) -> Option<&mut AttachmentTarget> {
        self.attachments.get_mut(&slot)
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// Generate every attachment.
    ///
    /// Missing attachments are created to match the framebuffer: a color
    /// texture in slot 0 and a depth renderbuffer. Ungenerated configured
    /// attachments are forced to the framebuffer's extent and sample count
    /// before generation. Attachments that were generated elsewhere with a
    /// different extent or sample count are kept as they are, with an error
    /// log so the mismatch is visible.
    pub fn generate(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.generated {
            return;
        }

        if !self
            .attachments
            .keys()
            .any(|slot| matches!(slot, AttachmentSlot::Color(_)))
        {
            let config = TextureConfig {
                kind: if self.samples > 1 {
                    TextureKind::D2Multisample
                } else {
                    TextureKind::D2
                },
                samples: self.samples,
                ..Default::default()
            };
            self.attachments.insert(
                AttachmentSlot::Color(0),
                AttachmentTarget::Texture(Texture::new(config).with_extent(self.extent)),
            );
        }
        if !self.attachments.contains_key(&AttachmentSlot::Depth) {
            self.attachments.insert(
                AttachmentSlot::Depth,
                AttachmentTarget::Renderbuffer(Renderbuffer::new(DEPTH_FORMAT, self.samples)),
            );
        }

        let extent = self.extent;
        let samples = self.samples;
        for (slot, target) in self.attachments.iter_mut() {
            if target.is_generated() {
                if target.extent() != extent || target.samples() != samples {
                    log::error!(
                        "framebuffer attachment {:?} mismatch: {}x{} {}x vs {}x{} {}x",
                        slot,
                        target.extent().width,
                        target.extent().height,
                        target.samples(),
                        extent.width,
                        extent.height,
                        samples
                    );
                }
                continue;
            }
            match target {
                AttachmentTarget::Texture(t) => {
                    t.set_extent(extent);
                    t.config.samples = samples;
                    if samples > 1 && t.config.kind == TextureKind::D2 {
                        t.config.kind = TextureKind::D2Multisample;
                    }
                    t.generate(device, queue);
                }
                AttachmentTarget::Renderbuffer(r) => {
                    r.extent = extent;
                    r.samples = samples;
                    r.generate(device);
                }
            }
        }
        self.generated = true;
    }

    /// Record a new extent on the framebuffer and its ungenerated
    /// attachments without touching GPU allocations. Generated attachments
    /// keep their allocation until a device-carrying [`resize`](Self::resize).
    pub fn set_extent(&mut self, extent: Extent2d) {
        self.extent = extent;
        for target in self.attachments.values_mut() {
            match target {
                AttachmentTarget::Texture(t) if !t.is_generated() => t.set_extent(extent),
                AttachmentTarget::Renderbuffer(r) if !r.is_generated() => r.extent = extent,
                _ => {}
            }
        }
    }

    /// Record a new extent and cascade it to every attachment. Generated
    /// attachments are reallocated immediately, ungenerated ones only update
    /// their records.
    pub fn resize(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, extent: Extent2d) {
        self.extent = extent;
        for target in self.attachments.values_mut() {
            match target {
                AttachmentTarget::Texture(t) => {
                    if t.is_generated() {
                        t.resize(device, queue, extent);
                    } else {
                        t.set_extent(extent);
                    }
                }
                AttachmentTarget::Renderbuffer(r) => r.resize(device, extent),
            }
        }
    }

    pub fn color_view(&self, index: u32) -> Option<&wgpu::TextureView> {
        self.attachments
            .get(&AttachmentSlot::Color(index))
            .and_then(|t| t.view())
    }

    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.attachments
            .get(&AttachmentSlot::Depth)
            .and_then(|t| t.view())
    }

    pub fn color_format(&self, index: u32) -> Option<wgpu::TextureFormat> {
        self.attachments
            .get(&AttachmentSlot::Color(index))
            .map(|t| match t {
                AttachmentTarget::Texture(t) => t.config.format,
                AttachmentTarget::Renderbuffer(r) => r.format,
            })
    }
}
