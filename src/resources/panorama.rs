//! Equirectangular panorama to cube map conversion.
//!
//! The converter (shader, layouts, per-format pipelines) is a process-wide
//! resource created on first use and reused for every conversion.
//! [`shutdown`] releases it explicitly; after that the next conversion
//! rebuilds it.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::data_structures::Extent2d;
use crate::data_structures::texture::{GpuTexture, Image, ImageData, TextureConfig, upload_pixels};

static CONVERTER: Mutex<Option<Converter>> = Mutex::new(None);

const SHADER: &str = r#"
struct FaceInfo {
    face: u32,
};

@group(0) @binding(0) var equirect: texture_2d<f32>;
@group(0) @binding(1) var equirect_sampler: sampler;
@group(0) @binding(2) var<uniform> face_info: FaceInfo;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VsOut {
    var out: VsOut;
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    out.pos = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = uv;
    return out;
}

const PI: f32 = 3.14159265358979;

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let a = in.uv.x * 2.0 - 1.0;
    let b = in.uv.y * 2.0 - 1.0;
    var dir: vec3<f32>;
    switch face_info.face {
        case 0u: { dir = vec3<f32>(1.0, -b, -a); }
        case 1u: { dir = vec3<f32>(-1.0, -b, a); }
        case 2u: { dir = vec3<f32>(a, 1.0, b); }
        case 3u: { dir = vec3<f32>(a, -1.0, -b); }
        case 4u: { dir = vec3<f32>(a, -b, 1.0); }
        default: { dir = vec3<f32>(-a, -b, -1.0); }
    }
    let d = normalize(dir);
    let u = atan2(d.z, d.x) / (2.0 * PI) + 0.5;
    let v = acos(clamp(d.y, -1.0, 1.0)) / PI;
    return textureSampleLevel(equirect, equirect_sampler, vec2<f32>(u, v), 0.0);
}
"#;

struct FormatPipeline {
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
}

struct Converter {
    module: wgpu::ShaderModule,
    pipelines: HashMap<wgpu::TextureFormat, FormatPipeline>,
}

impl Converter {
    fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("panorama converter"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });
        Self {
            module,
            pipelines: HashMap::new(),
        }
    }

    fn for_format(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) -> &FormatPipeline {
        if !self.pipelines.contains_key(&format) {
            // Float32 sources are not filterable without extra features, so
            // the HDR path samples nearest.
            let filterable = format != wgpu::TextureFormat::Rgba32Float;
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable },
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(if filterable {
                            wgpu::SamplerBindingType::Filtering
                        } else {
                            wgpu::SamplerBindingType::NonFiltering
                        }),
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
                label: Some("panorama layout"),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("panorama pipeline layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                cache: None,
                label: Some("panorama pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &self.module,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &self.module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });
            let filter = if filterable {
                wgpu::FilterMode::Linear
            } else {
                wgpu::FilterMode::Nearest
            };
            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                address_mode_u: wgpu::AddressMode::Repeat,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                ..Default::default()
            });
            self.pipelines.insert(
                format,
                FormatPipeline {
                    layout,
                    pipeline,
                    sampler,
                },
            );
        }
        self.pipelines.get(&format).unwrap()
    }
}

/// Release the converter. The next conversion recreates it from scratch.
pub fn shutdown() {
    *CONVERTER.lock().unwrap() = None;
}

/// Render the six cube faces of an equirectangular `image` into a new cube
/// texture with edge length `face_size`.
pub fn panorama_to_cubemap(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &Image,
    face_size: u32,
    config: &TextureConfig,
) -> GpuTexture {
    let format = match image.data {
        ImageData::Hdr(_) => wgpu::TextureFormat::Rgba32Float,
        ImageData::Bytes(_) => wgpu::TextureFormat::Rgba8UnormSrgb,
    };

    let equirect = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("equirect source"),
        size: wgpu::Extent3d {
            width: image.extent.width,
            height: image.extent.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    upload_pixels(queue, &equirect, image, Extent2d::new(image.extent.width, image.extent.height));
    let equirect_view = equirect.create_view(&wgpu::TextureViewDescriptor::default());

    let cube = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("cube map"),
        size: wgpu::Extent3d {
            width: face_size,
            height: face_size,
            depth_or_array_layers: 6,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });

    let mut guard = CONVERTER.lock().unwrap();
    let converter = guard.get_or_insert_with(|| Converter::new(device));
    let format_pipeline = converter.for_format(device, format);

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("panorama conversion"),
    });
    for face in 0..6u32 {
        let face_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("face index"),
            size: 16,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&face_buffer, 0, bytemuck::bytes_of(&[face, 0, 0, 0]));
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &format_pipeline.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&equirect_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&format_pipeline.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: face_buffer.as_entire_binding(),
                },
            ],
            label: Some("panorama face bind group"),
        });
        let face_view = cube.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_array_layer: face,
            array_layer_count: Some(1),
            ..Default::default()
        });
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("panorama face pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &face_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&format_pipeline.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
    queue.submit(std::iter::once(encoder.finish()));

    let view = cube.create_view(&wgpu::TextureViewDescriptor {
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    });
    // Float32 cube maps keep the non-filterable restriction of their source.
    let (mag, min) = match format {
        wgpu::TextureFormat::Rgba32Float => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest),
        _ => (config.mag_filter, config.min_filter),
    };
    let sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: mag,
        min_filter: min,
        ..Default::default()
    }));

    GpuTexture {
        texture: cube,
        view,
        sampler,
    }
}
