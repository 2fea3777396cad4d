//! Camera payload data: projection parameters and the projection matrix.
//!
//! The view matrix lives with the camera's scene node (see
//! [`crate::data_structures::scene_graph::Scene::view_matrix`]); this type
//! only owns the perspective projection, which is recomputed explicitly on
//! resize rather than lazily.

use cgmath::{Deg, Matrix4, SquareMatrix, perspective};

/// Perspective projection state of a camera node.
#[derive(Clone, Debug)]
pub struct CameraData {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    projection: Matrix4<f32>,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            fov: 60.0,
            near: 0.1,
            far: 1000.0,
            projection: Matrix4::identity(),
        }
    }
}

impl CameraData {
    pub fn new(fov: f32, near: f32, far: f32) -> Self {
        Self {
            fov,
            near,
            far,
            ..Default::default()
        }
    }

    /// Recompute the projection matrix for the given target size. Called
    /// explicitly, typically from the resize path.
    pub fn set_projection(&mut self, width: u32, height: u32) {
        let aspect = width as f32 / height.max(1) as f32;
        self.projection = perspective(Deg(self.fov), aspect, self.near, self.far);
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection
    }
}
