use lumen_ngin::data_structures::Extent2d;
use lumen_ngin::data_structures::framebuffer::{
    AttachmentSlot, AttachmentTarget, DEPTH_FORMAT, Framebuffer, Renderbuffer,
};
use lumen_ngin::data_structures::texture::{Texture, TextureConfig};

#[test]
fn ungenerated_resize_only_updates_records() {
    let mut fb = Framebuffer::new(Extent2d::new(640, 480), 1);
    fb.attach(
        AttachmentSlot::Color(0),
        AttachmentTarget::Texture(Texture::new(TextureConfig::default())),
    );
    fb.attach(
        AttachmentSlot::Depth,
        AttachmentTarget::Renderbuffer(Renderbuffer::new(DEPTH_FORMAT, 1)),
    );

    fb.set_extent(Extent2d::new(1920, 1080));
    assert_eq!(fb.extent, Extent2d::new(1920, 1080));
    assert!(!fb.is_generated());

    match fb.attachment(AttachmentSlot::Color(0)).unwrap() {
        AttachmentTarget::Texture(t) => {
            assert_eq!(t.extent, Extent2d::new(1920, 1080));
            assert!(!t.is_generated());
        }
        _ => panic!("expected a texture attachment"),
    }
    match fb.attachment(AttachmentSlot::Depth).unwrap() {
        AttachmentTarget::Renderbuffer(r) => {
            assert_eq!(r.extent, Extent2d::new(1920, 1080));
            assert!(!r.is_generated());
        }
        _ => panic!("expected a renderbuffer attachment"),
    }
}

#[test]
fn attach_replaces_slot_contents() {
    let mut fb = Framebuffer::new(Extent2d::new(64, 64), 1);
    fb.attach(
        AttachmentSlot::Color(0),
        AttachmentTarget::Renderbuffer(Renderbuffer::new(
            wgpu::TextureFormat::Rgba8UnormSrgb,
            1,
        )),
    );
    fb.attach(
        AttachmentSlot::Color(0),
        AttachmentTarget::Texture(Texture::new(TextureConfig::default())),
    );
    assert!(matches!(
        fb.attachment(AttachmentSlot::Color(0)),
        Some(AttachmentTarget::Texture(_))
    ));
}

#[test]
fn texture_set_extent_is_a_record_until_generation() {
    let mut texture = Texture::new(TextureConfig::default());
    texture.set_extent(Extent2d::new(256, 128));
    assert_eq!(texture.extent, Extent2d::new(256, 128));
    assert!(!texture.is_generated());
    assert!(!texture.has_image());
}

#[test]
fn color_formats_come_from_the_attachment() {
    let mut fb = Framebuffer::new(Extent2d::new(32, 32), 1);
    let config = TextureConfig {
        format: wgpu::TextureFormat::Rgba16Float,
        ..Default::default()
    };
    fb.attach(
        AttachmentSlot::Color(0),
        AttachmentTarget::Texture(Texture::new(config)),
    );
    assert_eq!(fb.color_format(0), Some(wgpu::TextureFormat::Rgba16Float));
    assert_eq!(fb.color_format(1), None);
}
