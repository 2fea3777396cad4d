//! Materials: fixed-function pipeline state, a named uniform table and
//! texture slot assignments, bound as a unit.
//!
//! Binding a material selects (or builds) the matching pipeline, applies its
//! pipeline state to the renderer's state tracker, uploads the packed
//! uniform block and attaches the texture table. Unbinding only clears the
//! shader and texture bookkeeping; the fixed-function fields stay as the
//! material left them and carry over into the next bind, which must set its
//! own.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use cgmath::Matrix4;

use crate::data_structures::texture::Texture;
use crate::data_structures::uniforms::UniformBuffer;
use crate::renderer::RenderState;
use crate::shader::Shader;

/// Fixed-function state a material configures when bound.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineState {
    pub cull_face: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: wgpu::CompareFunction,
    pub blending: bool,
    pub blend_src: wgpu::BlendFactor,
    pub blend_dst: wgpu::BlendFactor,
    pub blend_op: wgpu::BlendOperation,
    pub alpha_to_coverage: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            cull_face: false,
            depth_test: true,
            depth_write: true,
            depth_func: wgpu::CompareFunction::Less,
            blending: false,
            blend_src: wgpu::BlendFactor::SrcAlpha,
            blend_dst: wgpu::BlendFactor::OneMinusSrcAlpha,
            blend_op: wgpu::BlendOperation::Add,
            alpha_to_coverage: false,
        }
    }
}

/// A typed uniform value in the material's table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    /// Bytes the value occupies in the packed block, padded to the 16-byte
    /// field alignment.
    fn packed_size(&self) -> usize {
        match self {
            Self::Mat4(_) => 64,
            _ => 16,
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            Self::Float(v) => {
                out.extend_from_slice(bytemuck::bytes_of(v));
                out.extend_from_slice(&[0; 12]);
            }
            Self::Int(v) => {
                out.extend_from_slice(bytemuck::bytes_of(v));
                out.extend_from_slice(&[0; 12]);
            }
            Self::Bool(v) => {
                out.extend_from_slice(bytemuck::bytes_of(&(*v as u32)));
                out.extend_from_slice(&[0; 12]);
            }
            Self::Vec2(v) => {
                out.extend_from_slice(bytemuck::cast_slice(v));
                out.extend_from_slice(&[0; 8]);
            }
            Self::Vec3(v) => {
                out.extend_from_slice(bytemuck::cast_slice(v));
                out.extend_from_slice(&[0; 4]);
            }
            Self::Vec4(v) => out.extend_from_slice(bytemuck::cast_slice(v)),
            Self::Mat4(v) => {
                for col in v {
                    out.extend_from_slice(bytemuck::cast_slice(col));
                }
            }
        }
    }
}

/// Named uniform table of a material.
///
/// The table packs into a single uniform block at group 0, binding 0.
/// Fields are laid out in lexicographic name order, each aligned to 16
/// bytes. Shader blocks must declare their members in the same order; names
/// are the contract, as they are for location-based uniform APIs.
#[derive(Clone, Debug, Default)]
pub struct MaterialUniforms {
    values: BTreeMap<String, UniformValue>,
}

impl MaterialUniforms {
    pub fn set_float(&mut self, name: impl Into<String>, v: f32) {
        self.values.insert(name.into(), UniformValue::Float(v));
    }

    pub fn set_int(&mut self, name: impl Into<String>, v: i32) {
        self.values.insert(name.into(), UniformValue::Int(v));
    }

    pub fn set_bool(&mut self, name: impl Into<String>, v: bool) {
        self.values.insert(name.into(), UniformValue::Bool(v));
    }

    pub fn set_vec2(&mut self, name: impl Into<String>, v: [f32; 2]) {
        self.values.insert(name.into(), UniformValue::Vec2(v));
    }

    pub fn set_vec3(&mut self, name: impl Into<String>, v: [f32; 3]) {
        self.values.insert(name.into(), UniformValue::Vec3(v));
    }

    pub fn set_vec4(&mut self, name: impl Into<String>, v: [f32; 4]) {
        self.values.insert(name.into(), UniformValue::Vec4(v));
    }

    pub fn set_mat4(&mut self, name: impl Into<String>, v: Matrix4<f32>) {
        self.values.insert(name.into(), UniformValue::Mat4(v.into()));
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialize the table in lexicographic name order.
    pub fn pack(&self) -> Vec<u8> {
        let size: usize = self.values.values().map(UniformValue::packed_size).sum();
        let mut out = Vec::with_capacity(size);
        for value in self.values.values() {
            value.write(&mut out);
        }
        out
    }
}

/// A texture assigned to a slot, together with the sampler uniform it backs.
pub struct BoundTexture {
    pub texture: Rc<RefCell<Texture>>,
    pub uniform_name: String,
}

/// A shader program plus everything needed to draw with it.
pub struct Material {
    pub shader: Shader,
    pub state: PipelineState,
    pub uniforms: MaterialUniforms,
    textures: BTreeMap<u32, BoundTexture>,
    uniform_block: Option<UniformBuffer>,
    uniform_bind_group: Option<wgpu::BindGroup>,
    texture_bind_group: Option<wgpu::BindGroup>,
    /// Texture revisions the cached bind group was built against.
    bound_revisions: Vec<(u32, u64)>,
}

impl Material {
    pub fn new(shader: Shader) -> Self {
        Self {
            shader,
            state: PipelineState::default(),
            uniforms: MaterialUniforms::default(),
            textures: BTreeMap::new(),
            uniform_block: None,
            uniform_bind_group: None,
            texture_bind_group: None,
            bound_revisions: Vec::new(),
        }
    }

    /// Assign `texture` to `slot` and route it to the sampler uniform
    /// `name`.
    ///
    /// The int uniform `name` is written with the slot index at assignment
    /// time, coupling the two the way a sampler uniform and its texture
    /// unit are coupled. Re-assigning a slot replaces both the texture and
    /// the routing.
    pub fn set_texture(
        &mut self,
        name: impl Into<String>,
        texture: Rc<RefCell<Texture>>,
        slot: u32,
    ) {
        let name = name.into();
        self.uniforms.set_int(name.clone(), slot as i32);
        self.textures.insert(
            slot,
            BoundTexture {
                texture,
                uniform_name: name,
            },
        );
        self.texture_bind_group = None;
    }

    pub fn texture(&self, slot: u32) -> Option<&BoundTexture> {
        self.textures.get(&slot)
    }

    pub fn texture_slots(&self) -> Vec<u32> {
        self.textures.keys().copied().collect()
    }

    /// Slot indices paired with each texture's filterability, as the layouts
    /// need them. Only meaningful once the textures are generated.
    fn slot_bindings(&self) -> Vec<(u32, bool)> {
        self.textures
            .iter()
            .map(|(slot, bound)| (*slot, bound.texture.borrow().filterable()))
            .collect()
    }

    /// Write this material's pipeline state and binding bookkeeping into the
    /// renderer's state tracker.
    pub fn apply_render_state(&self, render_state: &mut RenderState) {
        render_state.bound_shader = Some(self.shader.label.clone());
        render_state.bound_textures = self
            .textures
            .iter()
            .map(|(slot, bound)| (*slot, bound.uniform_name.clone()))
            .collect();
        render_state.cull_face = self.state.cull_face;
        render_state.depth_test = self.state.depth_test;
        render_state.depth_write = self.state.depth_write;
        render_state.depth_func = self.state.depth_func;
        render_state.blending = self.state.blending;
        render_state.blend_src = self.state.blend_src;
        render_state.blend_dst = self.state.blend_dst;
        render_state.blend_op = self.state.blend_op;
        render_state.alpha_to_coverage = self.state.alpha_to_coverage;
    }

    /// Deactivate the material: the shader and texture records are cleared,
    /// the fixed-function fields are deliberately left untouched and leak
    /// into whatever is bound next.
    pub fn unbind(&self, render_state: &mut RenderState) {
        render_state.bound_shader = None;
        render_state.bound_textures.clear();
    }

    /// Bind the material for drawing into a pass with the given target
    /// layout. Returns `false` (and leaves the pass untouched) when the
    /// shader failed to link, the caller skips the draw.
    pub fn bind(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pass: &mut wgpu::RenderPass<'_>,
        render_state: &mut RenderState,
        topology: wgpu::PrimitiveTopology,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
        samples: u32,
    ) -> bool {
        // Textures generate first: their filterability (float formats are
        // non-filterable) decides the layouts below.
        for bound in self.textures.values() {
            bound.texture.borrow_mut().generate(device, queue);
        }
        let bindings = self.slot_bindings();
        let Some(pipeline) = self.shader.pipeline(
            device,
            &self.state,
            topology,
            color_format,
            depth_format,
            samples,
            &bindings,
        ) else {
            return false;
        };
        pass.set_pipeline(pipeline);
        self.apply_render_state(render_state);

        self.upload_uniforms(device, queue);
        if let Some(group) = &self.uniform_bind_group {
            pass.set_bind_group(0, group, &[]);
        }

        self.ensure_texture_bind_group(device, &bindings);
        if let Some(group) = &self.texture_bind_group {
            pass.set_bind_group(1, group, &[]);
        }
        true
    }

    fn upload_uniforms(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let packed = self.uniforms.pack();
        if packed.is_empty() {
            return;
        }
        let needs_realloc = self
            .uniform_block
            .as_ref()
            .map(|block| block.size < packed.len() as u64)
            .unwrap_or(true);
        if needs_realloc {
            let mut block = UniformBuffer::new(packed.len() as u64, 0);
            block.generate(device);
            let layout = Shader::uniform_layout(device);
            self.uniform_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: block.binding,
                    resource: block.buffer().expect("generated uniform block").as_entire_binding(),
                }],
                label: Some("material uniform bind group"),
            }));
            self.uniform_block = Some(block);
        }
        self.uniform_block
            .as_ref()
            .expect("generated uniform block")
            .upload(queue, &packed, 0);
    }

    /// Build the texture bind group if it is missing or stale. A texture
    /// resize bumps its revision, which makes the cached group stale: it
    /// still points at the old allocation.
    fn ensure_texture_bind_group(&mut self, device: &wgpu::Device, bindings: &[(u32, bool)]) {
        if bindings.is_empty() {
            return;
        }
        let revisions: Vec<(u32, u64)> = self
            .textures
            .iter()
            .map(|(slot, bound)| (*slot, bound.texture.borrow().revision()))
            .collect();
        if self.texture_bind_group.is_some() && revisions == self.bound_revisions {
            return;
        }
        let layout = Shader::texture_layout(device, bindings);
        let texture_refs: Vec<(u32, std::cell::Ref<'_, Texture>)> = self
            .textures
            .iter()
            .map(|(slot, bound)| (*slot, bound.texture.borrow()))
            .collect();
        let mut entries = Vec::with_capacity(texture_refs.len() * 2);
        for (slot, texture) in &texture_refs {
            let Some(gpu) = texture.gpu() else {
                log::error!("texture in slot {} failed to generate", slot);
                return;
            };
            let Some(sampler) = gpu.sampler.as_ref() else {
                log::error!("texture in slot {} has no sampler and cannot be bound", slot);
                return;
            };
            entries.push(wgpu::BindGroupEntry {
                binding: slot * 2,
                resource: wgpu::BindingResource::TextureView(&gpu.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: slot * 2 + 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        self.texture_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layout,
            entries: &entries,
            label: Some("material texture bind group"),
        }));
        self.bound_revisions = revisions;
    }
}
