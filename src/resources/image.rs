//! Image import with extension-driven decode channels.
//!
//! Import failure is not fatal: the error is logged and the texture is left
//! without pixel data, generating later as an empty allocation
//! ([`Texture::has_image`] reports the degraded state).

use std::path::Path;

use image::ImageReader;

use crate::data_structures::Extent2d;
use crate::data_structures::texture::{Image, ImageData, Texture};

/// Decode `path` and attach the pixels to `texture`.
///
/// PNG decodes to 8-bit RGBA, JPEG to 8-bit RGB, HDR and EXR to 32-bit
/// float RGBA. `panorama` tags the image as an equirectangular map, which
/// the texture converts to a cube map when generated.
pub fn load_image(texture: &mut Texture, path: impl AsRef<Path>, panorama: bool) {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let decoded = ImageReader::open(path)
        .map_err(anyhow::Error::from)
        .and_then(|reader| reader.decode().map_err(anyhow::Error::from));
    let decoded = match decoded {
        Ok(img) => img,
        Err(e) => {
            log::error!("failed to load image {}: {}", path.display(), e);
            return;
        }
    };

    let extent = Extent2d::new(decoded.width(), decoded.height());
    let (data, channels) = match extension.as_str() {
        "png" => (ImageData::Bytes(decoded.to_rgba8().into_raw()), 4),
        "jpg" | "jpeg" => (ImageData::Bytes(decoded.to_rgb8().into_raw()), 3),
        "hdr" | "exr" => (ImageData::Hdr(decoded.to_rgba32f().into_raw()), 4),
        other => {
            log::error!("unsupported image extension '{}' for {}", other, path.display());
            return;
        }
    };

    texture.image = Some(Image {
        path: path.display().to_string(),
        data,
        extent,
        channels,
        panorama,
    });
    if !panorama {
        texture.set_extent(extent);
    }
}
