//! Scene graph and hierarchical transforms.
//!
//! The scene is an arena of [`Node`]s addressed by [`NodeId`]. Every node
//! carries a [`Transform`] plus a tagged payload ([`NodeKind`]): an empty
//! grouping node, a camera, a mesh or a light. World matrices are computed
//! lazily: mutating a node's local position/rotation/scale marks the node and
//! all of its descendants dirty, and the next [`Scene::world_matrix`] query
//! recomputes exactly the stale part of the ancestor chain.

use cgmath::{Deg, InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3};

use crate::data_structures::camera::CameraData;
use crate::data_structures::geometry::Geometry;
use crate::material::Material;

/// Index of a node inside a [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Local TRS state of a node, its derived basis vectors and the cached world
/// matrix.
///
/// Rotation is stored in radians; [`Scene::set_rotation`] and
/// [`Scene::rotation`] convert from and to degrees. The cached world matrix
/// is only valid while the owning node is not dirty.
#[derive(Clone, Debug)]
pub struct Transform {
    pub position: Vector3<f32>,
    /// Euler angles in radians, applied in X, Y, Z order.
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
    pub right: Vector3<f32>,
    pub up: Vector3<f32>,
    pub forward: Vector3<f32>,
    pub(crate) world_matrix: Matrix4<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            right: Vector3::new(1.0, 0.0, 0.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            forward: Vector3::new(0.0, 0.0, 1.0),
            world_matrix: Matrix4::identity(),
        }
    }
}

/// Mesh payload: a node of this kind owns exactly one geometry and one
/// material. Dropping the node drops both.
pub struct MeshData {
    pub geometry: Geometry,
    pub material: Material,
}

/// Simple punctual light payload.
#[derive(Clone, Debug)]
pub struct LightData {
    pub color: [f32; 3],
    pub intensity: f32,
}

impl Default for LightData {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
        }
    }
}

/// Tagged node payload. Replaces a class hierarchy with one concrete node
/// type carrying variant data.
pub enum NodeKind {
    Empty,
    Camera(CameraData),
    Mesh(MeshData),
    Light(LightData),
}

/// A node in the scene tree: name, transform, enabled flag, parent
/// back-reference and owned children, plus the payload variant.
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    enabled: bool,
    dirty: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena of scene nodes. All structural and transform mutation goes through
/// the scene so that dirty marks can be pushed down the child lists.
#[derive(Default)]
pub struct Scene {
    nodes: Vec<Node>,
}

impl Scene {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Insert a root-level node and return its id.
    pub fn add(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.into(),
            transform: Transform::default(),
            kind,
            enabled: true,
            dirty: true,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Re-parent `child` under `parent`. The child keeps its local transform
    /// and is marked dirty so its next world matrix picks up the new chain.
    /// A previous parent loses its edge to the child.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(old_parent) = self.nodes[child.0].parent {
            self.nodes[old_parent.0].children.retain(|c| *c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.mark_dirty(child);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Ids of every node currently in the scene, in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn is_enabled(&self, id: NodeId) -> bool {
        self.nodes[id.0].enabled
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) {
        self.nodes[id.0].enabled = enabled;
        self.mark_dirty(id);
    }

    pub fn is_dirty(&self, id: NodeId) -> bool {
        self.nodes[id.0].dirty
    }

    pub fn position(&self, id: NodeId) -> Vector3<f32> {
        self.nodes[id.0].transform.position
    }

    pub fn set_position(&mut self, id: NodeId, position: Vector3<f32>) {
        self.nodes[id.0].transform.position = position;
        self.mark_dirty(id);
    }

    /// Euler rotation in degrees.
    pub fn rotation(&self, id: NodeId) -> Vector3<f32> {
        let r = self.nodes[id.0].transform.rotation;
        Vector3::new(
            Deg::from(Rad(r.x)).0,
            Deg::from(Rad(r.y)).0,
            Deg::from(Rad(r.z)).0,
        )
    }

    /// Set the Euler rotation in degrees. Stored internally in radians.
    ///
    /// Also re-derives the `forward` basis vector from the yaw (x) and pitch
    /// (y) angles and `right` as `forward x up`. `up` is never auto-derived
    /// and must be assigned explicitly for a non-default basis.
    pub fn set_rotation(&mut self, id: NodeId, degrees: Vector3<f32>) {
        let yaw = Rad::from(Deg(degrees.x)).0;
        let pitch = Rad::from(Deg(degrees.y)).0;
        let roll = Rad::from(Deg(degrees.z)).0;

        let t = &mut self.nodes[id.0].transform;
        t.rotation = Vector3::new(yaw, pitch, roll);

        let direction = Vector3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        );
        t.forward = -direction.normalize();
        t.right = t.forward.cross(t.up);

        self.mark_dirty(id);
    }

    /// Yaw angle (rotation about x in this parameterization), degrees.
    pub fn yaw(&self, id: NodeId) -> f32 {
        Deg::from(Rad(self.nodes[id.0].transform.rotation.x)).0
    }

    pub fn set_yaw(&mut self, id: NodeId, degrees: f32) {
        let r = self.rotation(id);
        self.set_rotation(id, Vector3::new(degrees, r.y, r.z));
    }

    /// Pitch angle (rotation about y in this parameterization), degrees.
    pub fn pitch(&self, id: NodeId) -> f32 {
        Deg::from(Rad(self.nodes[id.0].transform.rotation.y)).0
    }

    pub fn set_pitch(&mut self, id: NodeId, degrees: f32) {
        let r = self.rotation(id);
        self.set_rotation(id, Vector3::new(r.x, degrees, r.z));
    }

    pub fn scale(&self, id: NodeId) -> Vector3<f32> {
        self.nodes[id.0].transform.scale
    }

    pub fn set_scale(&mut self, id: NodeId, scale: Vector3<f32>) {
        self.nodes[id.0].transform.scale = scale;
        self.mark_dirty(id);
    }

    pub fn set_scale_uniform(&mut self, id: NodeId, scale: f32) {
        self.set_scale(id, Vector3::new(scale, scale, scale));
    }

    /// Replace the whole local transform at once.
    pub fn set_transform(&mut self, id: NodeId, transform: Transform) {
        self.nodes[id.0].transform = transform;
        self.mark_dirty(id);
    }

    /// World matrix of a node, recomputing lazily.
    ///
    /// For camera nodes this is the view matrix: a look-at composition of
    /// position, forward and up, cached under the same dirty flag. For every
    /// other node it is T * Rx * Ry * Rz * S composed with the parent's
    /// (recursively refreshed) world matrix.
    ///
    /// A node whose ancestry did not change since the last query returns the
    /// cached matrix bit-identically in O(1). Because mutation pushes dirty
    /// marks down the child lists, a parent-only move is always reflected in
    /// the child's next query.
    pub fn world_matrix(&mut self, id: NodeId) -> Matrix4<f32> {
        if self.nodes[id.0].dirty {
            let parent_matrix = self.nodes[id.0].parent.map(|p| self.world_matrix(p));
            let node = &mut self.nodes[id.0];
            let t = &mut node.transform;
            t.world_matrix = match node.kind {
                NodeKind::Camera(_) => Matrix4::look_at_rh(
                    Point3::new(t.position.x, t.position.y, t.position.z),
                    Point3::new(
                        t.position.x + t.forward.x,
                        t.position.y + t.forward.y,
                        t.position.z + t.forward.z,
                    ),
                    t.up,
                ),
                _ => {
                    let local = Matrix4::from_translation(t.position)
                        * Matrix4::from_angle_x(Rad(t.rotation.x))
                        * Matrix4::from_angle_y(Rad(t.rotation.y))
                        * Matrix4::from_angle_z(Rad(t.rotation.z))
                        * Matrix4::from_nonuniform_scale(t.scale.x, t.scale.y, t.scale.z);
                    match parent_matrix {
                        Some(parent) => parent * local,
                        None => local,
                    }
                }
            };
            node.dirty = false;
        }
        self.nodes[id.0].transform.world_matrix
    }

    /// View matrix of a camera node. Alias of [`Self::world_matrix`], kept
    /// for call-site clarity.
    pub fn view_matrix(&mut self, id: NodeId) -> Matrix4<f32> {
        self.world_matrix(id)
    }

    /// Mark a node and every descendant dirty. Push-based invalidation: this
    /// is what keeps child caches correct when only an ancestor moved.
    fn mark_dirty(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            self.nodes[current.0].dirty = true;
            stack.extend(self.nodes[current.0].children.iter().copied());
        }
    }
}
