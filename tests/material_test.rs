use std::cell::RefCell;
use std::rc::Rc;

use lumen_ngin::data_structures::texture::{Texture, TextureConfig};
use lumen_ngin::material::{Material, PipelineState, UniformValue};
use lumen_ngin::renderer::RenderState;
use lumen_ngin::shader::Shader;

const SHADER_SRC: &str = "#stage vertex\nfn vs() {}\n#stage fragment\nfn fs() {}\n";

fn material() -> Material {
    Material::new(Shader::from_source("test", SHADER_SRC))
}

#[test]
fn set_texture_couples_slot_and_uniform() {
    let mut material = material();
    let albedo = Rc::new(RefCell::new(Texture::new(TextureConfig::default())));
    material.set_texture("u_albedo", albedo, 2);

    assert_eq!(material.texture(2).unwrap().uniform_name, "u_albedo");
    assert_eq!(material.uniforms.get("u_albedo"), Some(&UniformValue::Int(2)));
}

#[test]
fn slot_reassignment_reroutes_the_uniform() {
    let mut material = material();
    let albedo = Rc::new(RefCell::new(Texture::new(TextureConfig::default())));
    let noise = Rc::new(RefCell::new(Texture::new(TextureConfig::default())));
    material.set_texture("u_albedo", albedo, 0);
    material.set_texture("u_noise", noise, 0);

    // The slot now belongs to the new texture and uniform.
    assert_eq!(material.texture(0).unwrap().uniform_name, "u_noise");
    assert_eq!(material.uniforms.get("u_noise"), Some(&UniformValue::Int(0)));
    // The displaced uniform keeps its last value; only the slot routing
    // changed.
    assert_eq!(material.uniforms.get("u_albedo"), Some(&UniformValue::Int(0)));
    assert_eq!(material.texture_slots(), vec![0]);
}

#[test]
fn unbind_clears_bindings_but_leaks_pipeline_state() {
    let mut material = material();
    material.state = PipelineState {
        depth_test: true,
        depth_write: false,
        blending: true,
        cull_face: true,
        ..Default::default()
    };
    let tex = Rc::new(RefCell::new(Texture::new(TextureConfig::default())));
    material.set_texture("u_albedo", tex, 0);

    let mut render_state = RenderState::default();
    assert!(!render_state.depth_test);
    assert!(!render_state.blending);

    material.apply_render_state(&mut render_state);
    assert_eq!(render_state.bound_shader.as_deref(), Some("test"));
    assert_eq!(render_state.bound_textures.get(&0).map(String::as_str), Some("u_albedo"));
    assert!(render_state.depth_test);
    assert!(render_state.blending);
    assert!(render_state.cull_face);
    assert!(!render_state.depth_write);

    material.unbind(&mut render_state);
    assert_eq!(render_state.bound_shader, None);
    assert!(render_state.bound_textures.is_empty());
    // The fixed-function fields survive the unbind and carry into the next
    // bind.
    assert!(render_state.depth_test);
    assert!(render_state.blending);
    assert!(render_state.cull_face);
    assert!(!render_state.depth_write);
}

#[test]
fn uniforms_pack_in_name_order_with_alignment() {
    let mut material = material();
    material.uniforms.set_float("b_roughness", 0.5);
    material.uniforms.set_vec3("a_tint", [1.0, 2.0, 3.0]);
    material.uniforms.set_vec4("c_rect", [4.0, 5.0, 6.0, 7.0]);

    let packed = material.uniforms.pack();
    // Three 16-byte aligned fields.
    assert_eq!(packed.len(), 48);

    let floats: &[f32] = bytemuck::cast_slice(&packed);
    // a_tint first (lexicographic), padded to 16 bytes.
    assert_eq!(&floats[0..3], &[1.0, 2.0, 3.0]);
    // b_roughness second.
    assert_eq!(floats[4], 0.5);
    // c_rect last.
    assert_eq!(&floats[8..12], &[4.0, 5.0, 6.0, 7.0]);
}

#[test]
fn mat4_packs_as_sixty_four_bytes() {
    let mut material = material();
    material.uniforms.set_mat4("u_model", cgmath::Matrix4::from_scale(2.0));
    material.uniforms.set_float("z_after", 1.0);
    let packed = material.uniforms.pack();
    assert_eq!(packed.len(), 64 + 16);
    let floats: &[f32] = bytemuck::cast_slice(&packed);
    assert_eq!(floats[0], 2.0);
    assert_eq!(floats[5], 2.0);
    assert_eq!(floats[15], 1.0);
    assert_eq!(floats[16], 1.0);
}
