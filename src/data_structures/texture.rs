//! Textures with a lazy generate/resize/upload lifecycle.
//!
//! A [`Texture`] starts as a CPU-side record of its configuration, optional
//! pixel data and extent. The GPU objects are created on the first
//! [`generate`](Texture::generate) and recreated in place on
//! [`resize`](Texture::resize). Resizing an ungenerated texture only updates
//! the recorded extent.

use crate::data_structures::Extent2d;
use crate::resources::panorama;

/// Shape of the underlying GPU texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    D2,
    D2Multisample,
    D2Array,
    D3,
    Cube,
}

/// Creation-time texture parameters.
#[derive(Clone, Debug)]
pub struct TextureConfig {
    pub kind: TextureKind,
    pub format: wgpu::TextureFormat,
    pub samples: u32,
    /// Array layers for `D2Array`, depth for `D3`, ignored otherwise.
    pub layers: u32,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub mipmap_filter: wgpu::FilterMode,
    pub address_mode: wgpu::AddressMode,
    pub anisotropy_clamp: u16,
    /// Drop the CPU pixel data once it has been uploaded.
    pub free_image_after_upload: bool,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            kind: TextureKind::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            samples: 1,
            layers: 1,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            address_mode: wgpu::AddressMode::Repeat,
            anisotropy_clamp: 1,
            free_image_after_upload: true,
        }
    }
}

/// Decoded pixel payload of an imported image.
#[derive(Clone, Debug)]
pub enum ImageData {
    /// 8-bit channels, `channels` per pixel.
    Bytes(Vec<u8>),
    /// 32-bit float channels (HDR sources).
    Hdr(Vec<f32>),
}

/// Imported image data waiting for upload.
#[derive(Clone, Debug)]
pub struct Image {
    pub path: String,
    pub data: ImageData,
    pub extent: Extent2d,
    pub channels: u32,
    /// Equirectangular panorama, converted to a cube map on generation.
    pub panorama: bool,
}

#[derive(Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

#[derive(Debug, Default)]
pub struct Texture {
    pub extent: Extent2d,
    pub config: TextureConfig,
    pub image: Option<Image>,
    gpu: Option<GpuTexture>,
    revision: u64,
}

impl Texture {
    pub fn new(config: TextureConfig) -> Self {
        Self {
            extent: Extent2d::default(),
            config,
            image: None,
            gpu: None,
            revision: 0,
        }
    }

    pub fn with_extent(mut self, extent: Extent2d) -> Self {
        self.extent = extent;
        self
    }

    pub fn is_generated(&self) -> bool {
        self.gpu.is_some()
    }

    /// Whether usable pixel data is attached. False after a failed import,
    /// the texture then generates as an empty allocation.
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn gpu(&self) -> Option<&GpuTexture> {
        self.gpu.as_ref()
    }

    pub fn view(&self) -> Option<&wgpu::TextureView> {
        self.gpu.as_ref().map(|g| &g.view)
    }

    pub fn sampler(&self) -> Option<&wgpu::Sampler> {
        self.gpu.as_ref().and_then(|g| g.sampler.as_ref())
    }

    /// Allocation counter, bumped every time [`generate`](Self::generate)
    /// creates new GPU storage. Cached bind groups compare it to notice a
    /// resize.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether this texture may be paired with a filtering sampler. Float32
    /// formats are not filterable on the default feature set.
    pub fn filterable(&self) -> bool {
        self.config.format != wgpu::TextureFormat::Rgba32Float
    }

    /// Record a new extent. Generated textures are reallocated immediately,
    /// ungenerated ones only keep the record for their eventual generation.
    pub fn resize(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, extent: Extent2d) {
        self.extent = extent;
        if self.gpu.is_some() {
            self.gpu = None;
            self.generate(device, queue);
        }
    }

    /// Extent bookkeeping without a device at hand, for ungenerated
    /// textures. A generated texture keeps its allocation until the next
    /// device-carrying resize.
    pub fn set_extent(&mut self, extent: Extent2d) {
        self.extent = extent;
    }

    /// Create the GPU texture, upload pixel data if present and build the
    /// sampler. Exactly-once: repeated calls on a generated texture return
    /// immediately. Panorama images are routed through the equirect to
    /// cube map converter instead of a plain upload.
    pub fn generate(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.gpu.is_some() {
            return;
        }

        if let Some(image) = &self.image {
            if image.panorama {
                self.config.kind = TextureKind::Cube;
                self.config.format = match image.data {
                    ImageData::Hdr(_) => wgpu::TextureFormat::Rgba32Float,
                    ImageData::Bytes(_) => wgpu::TextureFormat::Rgba8UnormSrgb,
                };
                let face_size = (image.extent.height / 2).max(1);
                self.extent = Extent2d::new(face_size, face_size);
                self.gpu = Some(panorama::panorama_to_cubemap(
                    device,
                    queue,
                    image,
                    face_size,
                    &self.config,
                ));
                if self.config.free_image_after_upload {
                    self.image = None;
                }
                self.revision += 1;
                return;
            }
            self.extent = image.extent;
            self.config.format = match image.data {
                ImageData::Hdr(_) => wgpu::TextureFormat::Rgba32Float,
                ImageData::Bytes(_) => self.config.format,
            };
        }

        let extent = Extent2d::new(self.extent.width.max(1), self.extent.height.max(1));
        self.extent = extent;
        let (dimension, depth_or_array_layers) = match self.config.kind {
            TextureKind::D2 | TextureKind::D2Multisample => (wgpu::TextureDimension::D2, 1),
            TextureKind::D2Array => (wgpu::TextureDimension::D2, self.config.layers.max(1)),
            TextureKind::Cube => (wgpu::TextureDimension::D2, 6),
            TextureKind::D3 => (wgpu::TextureDimension::D3, self.config.layers.max(1)),
        };
        let sample_count = match self.config.kind {
            TextureKind::D2Multisample => self.config.samples.max(1),
            _ => 1,
        };

        let size = wgpu::Extent3d {
            width: extent.width,
            height: extent.height,
            depth_or_array_layers,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("texture"),
            size,
            mip_level_count: 1,
            sample_count,
            dimension,
            format: self.config.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        if let Some(image) = &self.image {
            upload_pixels(queue, &texture, image, extent);
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(match self.config.kind {
                TextureKind::D2 | TextureKind::D2Multisample => wgpu::TextureViewDimension::D2,
                TextureKind::D2Array => wgpu::TextureViewDimension::D2Array,
                TextureKind::Cube => wgpu::TextureViewDimension::Cube,
                TextureKind::D3 => wgpu::TextureViewDimension::D3,
            }),
            ..Default::default()
        });

        // Multisampled and 3D textures are render or storage targets, a
        // filtering sampler is meaningless for them. Float32 textures are
        // not filterable without extra features, they sample nearest.
        let sampler = match self.config.kind {
            TextureKind::D2Multisample | TextureKind::D3 | TextureKind::D2Array => None,
            _ => {
                let (mag, min, mip) = if self.filterable() {
                    (
                        self.config.mag_filter,
                        self.config.min_filter,
                        self.config.mipmap_filter,
                    )
                } else {
                    (
                        wgpu::FilterMode::Nearest,
                        wgpu::FilterMode::Nearest,
                        wgpu::FilterMode::Nearest,
                    )
                };
                Some(device.create_sampler(&wgpu::SamplerDescriptor {
                    address_mode_u: self.config.address_mode,
                    address_mode_v: self.config.address_mode,
                    address_mode_w: self.config.address_mode,
                    mag_filter: mag,
                    min_filter: min,
                    mipmap_filter: mip,
                    anisotropy_clamp: if self.filterable() {
                        self.config.anisotropy_clamp
                    } else {
                        1
                    },
                    ..Default::default()
                }))
            }
        };

        if self.config.free_image_after_upload {
            self.image = None;
        }

        self.gpu = Some(GpuTexture {
            texture,
            view,
            sampler,
        });
        self.revision += 1;
    }
}

/// Upload decoded pixels, widening 3-channel data to the 4-channel GPU
/// formats wgpu requires.
pub(crate) fn upload_pixels(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    image: &Image,
    extent: Extent2d,
) {
    let size = wgpu::Extent3d {
        width: extent.width,
        height: extent.height,
        depth_or_array_layers: 1,
    };
    let (data, bytes_per_pixel): (Vec<u8>, u32) = match &image.data {
        ImageData::Bytes(bytes) => match image.channels {
            4 => (bytes.clone(), 4),
            3 => {
                let mut rgba = Vec::with_capacity(bytes.len() / 3 * 4);
                for px in bytes.chunks_exact(3) {
                    rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
                (rgba, 4)
            }
            channels => {
                log::error!("unsupported channel count {} for {}", channels, image.path);
                return;
            }
        },
        ImageData::Hdr(floats) => match image.channels {
            4 => (bytemuck::cast_slice(floats).to_vec(), 16),
            3 => {
                let mut rgba = Vec::with_capacity(floats.len() / 3 * 4);
                for px in floats.chunks_exact(3) {
                    rgba.extend_from_slice(&[px[0], px[1], px[2], 1.0]);
                }
                (bytemuck::cast_slice(&rgba).to_vec(), 16)
            }
            channels => {
                log::error!("unsupported channel count {} for {}", channels, image.path);
                return;
            }
        },
    };
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
        },
        &data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(bytes_per_pixel * extent.width),
            rows_per_image: Some(extent.height),
        },
        size,
    );
}
