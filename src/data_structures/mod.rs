//! Engine data models: scene graph, cameras and GPU resource wrappers.

pub mod camera;
pub mod framebuffer;
pub mod geometry;
pub mod scene_graph;
pub mod texture;
pub mod uniforms;

/// Two dimensional pixel extent, used by textures, framebuffers and windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for Extent2d {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Three dimensional extent, used for compute workgroup counts and layered
/// texture allocations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3d {
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }
}
