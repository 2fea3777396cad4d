//! Asset import: files, meshes, images and panorama conversion.

use std::path::Path;

pub mod image;
pub mod mesh;
pub mod panorama;

pub async fn load_string(path: impl AsRef<Path>) -> anyhow::Result<String> {
    let path = path.as_ref();
    let txt = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("could not read {}: {}", path.display(), e))?;
    Ok(txt)
}

pub async fn load_binary(path: impl AsRef<Path>) -> anyhow::Result<Vec<u8>> {
    let path = path.as_ref();
    let data = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("could not read {}: {}", path.display(), e))?;
    Ok(data)
}
