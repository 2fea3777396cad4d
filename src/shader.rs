//! Shader programs parsed from single-source `#stage` files.
//!
//! A shader file carries all of its stages in one source, split by
//! `#stage vertex` / `#stage fragment` markers. Render shaders keep a cache
//! of concrete pipelines, one per pipeline state and target layout they have
//! been bound with, the analog of a program object that is relinked per
//! fixed-function configuration. Compute shaders are single-stage and
//! dispatch immediately.

use std::collections::HashMap;

use crate::data_structures::Extent3d;
use crate::data_structures::geometry::Vertex;
use crate::material::PipelineState;

/// Stage sources split out of a single shader file. A stage that is absent
/// from the source is the empty string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageSources {
    pub vertex: String,
    pub fragment: String,
}

/// Split a single-source shader into its stages.
///
/// Lines starting with `#stage <name>` open a stage section. Geometry and
/// tessellation sections are recognized but unsupported on this backend and
/// are dropped with a warning.
pub fn parse_stages(source: &str) -> StageSources {
    let mut stages = StageSources::default();
    let mut current: Option<&str> = None;
    for line in source.lines() {
        let trimmed = line.trim();
        if let Some(name) = trimmed.strip_prefix("#stage") {
            let name = name.trim();
            match name {
                "vertex" | "fragment" => current = Some(if name == "vertex" { "v" } else { "f" }),
                "geometry" | "control" | "eval" => {
                    log::warn!("unsupported shader stage '{}', ignoring section", name);
                    current = None;
                }
                other => {
                    log::warn!("unknown shader stage '{}', ignoring section", other);
                    current = None;
                }
            }
            continue;
        }
        match current {
            Some("v") => {
                stages.vertex.push_str(line);
                stages.vertex.push('\n');
            }
            Some("f") => {
                stages.fragment.push_str(line);
                stages.fragment.push('\n');
            }
            _ => {}
        }
    }
    stages
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    state: PipelineState,
    topology: wgpu::PrimitiveTopology,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    samples: u32,
    /// Bound texture slots with their filterability.
    texture_slots: Vec<(u32, bool)>,
}

struct Modules {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
}

/// A render shader program: stage sources, their compiled modules and the
/// per-configuration pipeline cache.
///
/// A shader whose source is missing a vertex or fragment stage fails to
/// link; binding it is a logged no-op and draws using it are skipped, the
/// application keeps running.
pub struct Shader {
    pub label: String,
    sources: StageSources,
    modules: Option<Modules>,
    linked: bool,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl Shader {
    pub fn from_source(label: impl Into<String>, source: &str) -> Self {
        Self {
            label: label.into(),
            sources: parse_stages(source),
            modules: None,
            linked: true,
            pipelines: HashMap::new(),
        }
    }

    pub fn sources(&self) -> &StageSources {
        &self.sources
    }

    /// Whether the program has usable vertex and fragment stages. Checked
    /// before compilation, a failed link leaves the shader permanently
    /// degraded.
    pub fn is_linked(&self) -> bool {
        self.linked && !self.sources.vertex.is_empty() && !self.sources.fragment.is_empty()
    }

    fn ensure_modules(&mut self, device: &wgpu::Device) -> bool {
        if !self.is_linked() {
            if self.linked {
                log::error!(
                    "shader '{}' is missing a vertex or fragment stage",
                    self.label
                );
                self.linked = false;
            }
            return false;
        }
        if self.modules.is_none() {
            // Compile errors must degrade the shader, not abort through the
            // uncaptured error handler.
            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{} vertex", self.label)),
                source: wgpu::ShaderSource::Wgsl(self.sources.vertex.as_str().into()),
            });
            let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{} fragment", self.label)),
                source: wgpu::ShaderSource::Wgsl(self.sources.fragment.as_str().into()),
            });
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            if let Some(error) = runtime.block_on(device.pop_error_scope()) {
                log::error!("shader '{}' failed to compile: {}", self.label, error);
                self.linked = false;
                return false;
            }
            self.modules = Some(Modules { vertex, fragment });
        }
        true
    }

    /// Uniform block layout shared by every pipeline of this shader:
    /// group 0, binding 0.
    pub fn uniform_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("shader uniform layout"),
        })
    }

    /// Texture table layout: group 1, view at binding `2 * slot` and sampler
    /// at `2 * slot + 1` for each bound `(slot, filterable)` pair.
    /// Non-filterable slots (float32 textures on the default feature set)
    /// get a non-filtering sampler entry.
    pub fn texture_layout(device: &wgpu::Device, slots: &[(u32, bool)]) -> wgpu::BindGroupLayout {
        let mut entries = Vec::with_capacity(slots.len() * 2);
        for &(slot, filterable) in slots {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: slot * 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable },
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: slot * 2 + 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(if filterable {
                    wgpu::SamplerBindingType::Filtering
                } else {
                    wgpu::SamplerBindingType::NonFiltering
                }),
                count: None,
            });
        }
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &entries,
            label: Some("shader texture layout"),
        })
    }

    /// Pipeline for the given fixed-function state and target layout,
    /// building and caching it on first request. Returns `None` when the
    /// shader failed to link.
    pub fn pipeline(
        &mut self,
        device: &wgpu::Device,
        state: &PipelineState,
        topology: wgpu::PrimitiveTopology,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
        samples: u32,
        texture_slots: &[(u32, bool)],
    ) -> Option<&wgpu::RenderPipeline> {
        if !self.ensure_modules(device) {
            return None;
        }
        let key = PipelineKey {
            state: state.clone(),
            topology,
            color_format,
            depth_format,
            samples,
            texture_slots: texture_slots.to_vec(),
        };
        if !self.pipelines.contains_key(&key) {
            let pipeline = self.build_pipeline(device, &key);
            self.pipelines.insert(key.clone(), pipeline);
        }
        self.pipelines.get(&key)
    }

    fn build_pipeline(&self, device: &wgpu::Device, key: &PipelineKey) -> wgpu::RenderPipeline {
        let modules = self.modules.as_ref().unwrap();
        let uniform_layout = Self::uniform_layout(device);
        let texture_layout = Self::texture_layout(device, &key.texture_slots);
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} pipeline layout", self.label)),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let blend = if key.state.blending {
            Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: key.state.blend_src,
                    dst_factor: key.state.blend_dst,
                    operation: key.state.blend_op,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: key.state.blend_src,
                    dst_factor: key.state.blend_dst,
                    operation: key.state.blend_op,
                },
            })
        } else {
            None
        };

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            cache: None,
            label: Some(&self.label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &modules.vertex,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &modules.fragment,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.color_format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: key.topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: if key.state.cull_face {
                    Some(wgpu::Face::Back)
                } else {
                    None
                },
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: key.depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: key.state.depth_write,
                depth_compare: if key.state.depth_test {
                    key.state.depth_func
                } else {
                    wgpu::CompareFunction::Always
                },
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: key.samples,
                mask: !0,
                alpha_to_coverage_enabled: key.state.alpha_to_coverage,
            },
            multiview: None,
        })
    }
}

/// Write visibility classes a dispatch can order against subsequent reads.
///
/// On this backend every class maps to the same primitive, the submission
/// boundary, which orders all writes of a dispatch before later work. The
/// variants are kept so call sites state what they are waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryBarrier {
    ShaderStorage,
    UniformBuffer,
    TextureFetch,
    VertexAttribArray,
    All,
}

/// A single-stage compute program with immediate dispatch.
pub struct ComputeShader {
    pub label: String,
    source: String,
    pipeline: Option<wgpu::ComputePipeline>,
}

impl ComputeShader {
    pub fn from_source(label: impl Into<String>, source: &str) -> Self {
        Self {
            label: label.into(),
            source: source.to_string(),
            pipeline: None,
        }
    }

    /// Compile the pipeline if needed. The bind group layout is derived from
    /// the shader source.
    pub fn ensure_pipeline(&mut self, device: &wgpu::Device) {
        if self.pipeline.is_some() {
            return;
        }
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&self.label),
            source: wgpu::ShaderSource::Wgsl(self.source.as_str().into()),
        });
        self.pipeline = Some(
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&self.label),
                layout: None,
                module: &module,
                entry_point: Some("cs_main"),
                compilation_options: Default::default(),
                cache: None,
            }),
        );
    }

    /// Layout of bind group `index`, available after
    /// [`ensure_pipeline`](Self::ensure_pipeline).
    pub fn bind_group_layout(&self, index: u32) -> Option<wgpu::BindGroupLayout> {
        self.pipeline.as_ref().map(|p| p.get_bind_group_layout(index))
    }

    /// Record and submit one dispatch of `workgroups` immediately.
    ///
    /// With a barrier the dispatch's writes are ordered before any work
    /// submitted afterwards; without one, only passes inside the same
    /// submission are ordered.
    pub fn dispatch(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bind_groups: &[&wgpu::BindGroup],
        workgroups: Extent3d,
        barrier: Option<MemoryBarrier>,
    ) {
        self.ensure_pipeline(device);
        let pipeline = self.pipeline.as_ref().unwrap();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("compute dispatch"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&self.label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            for (index, group) in bind_groups.iter().enumerate() {
                pass.set_bind_group(index as u32, *group, &[]);
            }
            pass.dispatch_workgroups(workgroups.width, workgroups.height, workgroups.depth);
        }
        queue.submit(std::iter::once(encoder.finish()));
        if barrier.is_some() {
            Self::set_barrier(queue);
        }
    }

    /// Flush ordering between previously submitted work and whatever comes
    /// next. An empty submission forces the queue to a consistent point.
    pub fn set_barrier(queue: &wgpu::Queue) {
        queue.submit(std::iter::empty());
    }
}
