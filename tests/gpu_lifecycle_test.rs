//! GPU-backed lifecycle tests. These need a working adapter, so they are
//! gated behind the `integration-tests` feature:
//! `cargo test --features integration-tests`.
#![cfg(feature = "integration-tests")]

use lumen_ngin::data_structures::framebuffer::{AttachmentSlot, AttachmentTarget, Framebuffer};
use lumen_ngin::data_structures::geometry::Geometry;
use lumen_ngin::data_structures::texture::{Texture, TextureConfig};
use lumen_ngin::data_structures::uniforms::UniformBuffer;
use lumen_ngin::data_structures::{Extent2d, Extent3d};
use lumen_ngin::material::PipelineState;
use lumen_ngin::shader::{ComputeShader, MemoryBarrier, Shader};

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Runtime::new().unwrap().block_on(future)
}

fn gpu() -> (wgpu::Device, wgpu::Queue) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .expect("no graphics adapter for integration tests");
        adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .expect("no graphics device for integration tests")
    })
}

#[test]
fn texture_generation_happens_exactly_once() {
    let (device, queue) = gpu();
    let mut texture =
        Texture::new(TextureConfig::default()).with_extent(Extent2d::new(64, 32));
    assert!(!texture.is_generated());

    texture.generate(&device, &queue);
    assert!(texture.is_generated());
    let format = texture.gpu().unwrap().texture.format();

    // A second generate must not recreate the allocation: changing the
    // config afterwards has no effect until a resize.
    texture.config.format = wgpu::TextureFormat::Rgba16Float;
    texture.generate(&device, &queue);
    assert_eq!(texture.gpu().unwrap().texture.format(), format);
    assert_eq!(texture.gpu().unwrap().texture.width(), 64);
}

#[test]
fn geometry_buffers_upload_once() {
    let (device, _queue) = gpu();
    let mut geometry = Geometry::quad(1);
    assert!(!geometry.is_generated());

    geometry.ensure_generated(&device);
    let size = geometry.buffers().unwrap().vertex.size();

    // Editing CPU data without invalidating leaves the GPU side untouched.
    geometry.vertices.push(Default::default());
    geometry.ensure_generated(&device);
    assert_eq!(geometry.buffers().unwrap().vertex.size(), size);

    geometry.invalidate();
    geometry.ensure_generated(&device);
    assert!(geometry.buffers().unwrap().vertex.size() > size);
}

#[test]
fn generated_framebuffer_resize_cascades() {
    let (device, queue) = gpu();
    let mut fb = Framebuffer::new(Extent2d::new(128, 128), 1);
    fb.generate(&device, &queue);
    assert!(fb.is_generated());

    // Auto-generated attachments exist and match the framebuffer.
    let tex_extent = match fb.attachment(AttachmentSlot::Color(0)).unwrap() {
        AttachmentTarget::Texture(t) => {
            let gpu = t.gpu().unwrap();
            (gpu.texture.width(), gpu.texture.height())
        }
        _ => panic!("expected an auto-generated color texture"),
    };
    assert_eq!(tex_extent, (128, 128));
    assert!(fb.depth_view().is_some());

    fb.resize(&device, &queue, Extent2d::new(256, 64));
    match fb.attachment(AttachmentSlot::Color(0)).unwrap() {
        AttachmentTarget::Texture(t) => {
            let gpu = t.gpu().unwrap();
            assert_eq!((gpu.texture.width(), gpu.texture.height()), (256, 64));
        }
        _ => unreachable!(),
    }
}

#[test]
fn texture_resize_bumps_the_allocation_revision() {
    let (device, queue) = gpu();
    let mut texture =
        Texture::new(TextureConfig::default()).with_extent(Extent2d::new(16, 16));
    assert_eq!(texture.revision(), 0);

    texture.generate(&device, &queue);
    let first = texture.revision();
    assert!(first > 0);

    // A repeated generate keeps the allocation and the revision.
    texture.generate(&device, &queue);
    assert_eq!(texture.revision(), first);

    // A resize replaces the allocation; cached bind groups compare the
    // revision to notice and rebuild.
    texture.resize(&device, &queue, Extent2d::new(32, 32));
    assert!(texture.revision() > first);
    assert_eq!(texture.gpu().unwrap().texture.width(), 32);
}

#[test]
fn float_textures_bind_with_a_non_filtering_layout() {
    let (device, queue) = gpu();
    let mut texture = Texture::new(TextureConfig {
        format: wgpu::TextureFormat::Rgba32Float,
        ..Default::default()
    })
    .with_extent(Extent2d::new(8, 8));
    texture.generate(&device, &queue);
    assert!(!texture.filterable());

    // The default device has no float32 filtering feature, so the layout
    // and sampler pair must validate as non-filtering.
    let gpu_texture = texture.gpu().unwrap();
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let layout = Shader::texture_layout(&device, &[(0, texture.filterable())]);
    let _bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: &layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&gpu_texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(
                    gpu_texture.sampler.as_ref().unwrap(),
                ),
            },
        ],
        label: Some("float texture bind group"),
    });
    let error = block_on(device.pop_error_scope());
    assert!(error.is_none(), "float texture failed to bind: {:?}", error);
}

#[test]
fn broken_shader_source_degrades_the_shader() {
    let (device, _queue) = gpu();
    let mut shader = Shader::from_source(
        "broken",
        "#stage vertex\nthis is not wgsl\n#stage fragment\nneither is this\n",
    );
    assert!(shader.is_linked());

    let pipeline = shader.pipeline(
        &device,
        &PipelineState::default(),
        wgpu::PrimitiveTopology::TriangleList,
        wgpu::TextureFormat::Rgba8UnormSrgb,
        None,
        1,
        &[],
    );
    assert!(pipeline.is_none());
    assert!(!shader.is_linked());
}

#[test]
fn multisampled_texture_has_no_sampler() {
    let (device, queue) = gpu();
    let mut texture = Texture::new(TextureConfig {
        kind: lumen_ngin::data_structures::texture::TextureKind::D2Multisample,
        samples: 4,
        ..Default::default()
    })
    .with_extent(Extent2d::new(32, 32));
    texture.generate(&device, &queue);
    assert!(texture.gpu().unwrap().sampler.is_none());
    assert_eq!(texture.gpu().unwrap().texture.sample_count(), 4);
}

#[test]
fn uniform_block_uploads_are_bounds_checked() {
    let (device, queue) = gpu();
    let mut block = UniformBuffer::new(64, 0);
    assert!(!block.is_generated());

    // Writes to an ungenerated block are dropped, not fatal.
    block.upload(&queue, &[0u8; 16], 0);

    block.generate(&device);
    assert!(block.is_generated());
    block.generate(&device);

    // Whole and sub-range uploads are fine, out-of-range ones are dropped.
    block.upload(&queue, &[1u8; 64], 0);
    block.upload(&queue, &[2u8; 16], 48);
    block.upload(&queue, &[3u8; 32], 48);
    queue.submit(std::iter::empty());
}

const FILL_SHADER: &str = "\
@group(0) @binding(0) var<storage, read_write> data: array<u32>;

@compute @workgroup_size(64)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x < arrayLength(&data)) {
        data[id.x] = id.x;
    }
}
";

#[test]
fn compute_dispatch_with_barrier_is_readable() {
    let (device, queue) = gpu();
    const COUNT: u64 = 256;

    let storage = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("compute storage"),
        size: COUNT * 4,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });

    let mut shader = ComputeShader::from_source("fill", FILL_SHADER);
    shader.ensure_pipeline(&device);
    let layout = shader.bind_group_layout(0).unwrap();
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: &layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: storage.as_entire_binding(),
        }],
        label: Some("compute bind group"),
    });

    shader.dispatch(
        &device,
        &queue,
        &[&bind_group],
        Extent3d::new((COUNT as u32).div_ceil(64), 1, 1),
        Some(MemoryBarrier::ShaderStorage),
    );

    // Read the buffer back and checksum it.
    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback"),
        size: COUNT * 4,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_buffer_to_buffer(&storage, 0, &readback, 0, COUNT * 4);
    queue.submit(std::iter::once(encoder.finish()));

    let sum: u64 = block_on(async {
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let slice = readback.slice(..);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).unwrap();
        });
        device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(std::time::Duration::from_secs(3)),
            })
            .unwrap();
        rx.receive().await.unwrap().unwrap();
        let data = slice.get_mapped_range();
        let values: &[u32] = bytemuck::cast_slice(&data);
        values.iter().map(|&v| v as u64).sum()
    });

    // 0 + 1 + ... + 255
    assert_eq!(sum, (COUNT - 1) * COUNT / 2);
}
