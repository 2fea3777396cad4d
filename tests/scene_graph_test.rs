use cgmath::{InnerSpace, Matrix4, Vector3};
use lumen_ngin::data_structures::camera::CameraData;
use lumen_ngin::data_structures::scene_graph::{NodeKind, Scene};

fn as_array(m: Matrix4<f32>) -> [[f32; 4]; 4] {
    m.into()
}

#[test]
fn world_matrix_is_cached_bit_identically() {
    let mut scene = Scene::new();
    let parent = scene.add("parent", NodeKind::Empty);
    let child = scene.add("child", NodeKind::Empty);
    scene.add_child(parent, child);

    scene.set_position(parent, Vector3::new(1.0, 2.0, 3.0));
    scene.set_rotation(child, Vector3::new(33.3, -12.7, 4.2));
    scene.set_position(child, Vector3::new(-0.5, 0.25, 8.0));

    let first = as_array(scene.world_matrix(child));
    let second = as_array(scene.world_matrix(child));
    assert_eq!(first, second);
    assert!(!scene.is_dirty(child));

    // Mutating an unrelated sibling must not disturb the cache.
    let sibling = scene.add("sibling", NodeKind::Empty);
    scene.add_child(parent, sibling);
    scene.set_position(sibling, Vector3::new(9.0, 9.0, 9.0));
    assert_eq!(as_array(scene.world_matrix(child)), first);
}

#[test]
fn parent_move_reaches_child_caches() {
    let mut scene = Scene::new();
    let parent = scene.add("parent", NodeKind::Empty);
    let child = scene.add("child", NodeKind::Empty);
    scene.add_child(parent, child);

    scene.set_position(parent, Vector3::new(1.0, 0.0, 0.0));
    scene.set_position(child, Vector3::new(0.0, 2.0, 0.0));
    let before = scene.world_matrix(child);
    assert_eq!(before.w.x, 1.0);
    assert_eq!(before.w.y, 2.0);

    // Only the parent moves; the child was cached and must still follow.
    scene.set_position(parent, Vector3::new(10.0, 0.0, 0.0));
    assert!(scene.is_dirty(child));
    let after = scene.world_matrix(child);
    assert_eq!(after.w.x, 10.0);
    assert_eq!(after.w.y, 2.0);
}

#[test]
fn grandchildren_are_invalidated_too() {
    let mut scene = Scene::new();
    let root = scene.add("root", NodeKind::Empty);
    let mid = scene.add("mid", NodeKind::Empty);
    let leaf = scene.add("leaf", NodeKind::Empty);
    scene.add_child(root, mid);
    scene.add_child(mid, leaf);

    scene.world_matrix(leaf);
    assert!(!scene.is_dirty(leaf));

    scene.set_position(root, Vector3::new(0.0, 0.0, 5.0));
    assert!(scene.is_dirty(mid));
    assert!(scene.is_dirty(leaf));
    assert_eq!(scene.world_matrix(leaf).w.z, 5.0);
}

#[test]
fn reparenting_detaches_the_old_edge() {
    let mut scene = Scene::new();
    let first = scene.add("first", NodeKind::Empty);
    let second = scene.add("second", NodeKind::Empty);
    let child = scene.add("child", NodeKind::Empty);

    scene.add_child(first, child);
    scene.add_child(second, child);

    assert!(scene.children(first).is_empty());
    assert_eq!(scene.children(second), &[child]);
    assert_eq!(scene.parent(child), Some(second));

    // Only the current parent's moves reach the child.
    scene.world_matrix(child);
    scene.set_position(first, Vector3::new(1.0, 0.0, 0.0));
    assert!(!scene.is_dirty(child));
    scene.set_position(second, Vector3::new(0.0, 1.0, 0.0));
    assert!(scene.is_dirty(child));
    assert_eq!(scene.world_matrix(child).w.y, 1.0);
}

#[test]
fn rotation_round_trips_in_degrees() {
    let mut scene = Scene::new();
    let node = scene.add("node", NodeKind::Empty);
    scene.set_rotation(node, Vector3::new(90.0, -45.0, 30.0));
    let r = scene.rotation(node);
    assert!((r.x - 90.0).abs() < 1e-4);
    assert!((r.y + 45.0).abs() < 1e-4);
    assert!((r.z - 30.0).abs() < 1e-4);

    scene.set_pitch(node, 10.0);
    assert!((scene.pitch(node) - 10.0).abs() < 1e-4);
    assert!((scene.yaw(node) - 90.0).abs() < 1e-4);
}

#[test]
fn rotation_derives_forward_and_right() {
    let mut scene = Scene::new();
    let node = scene.add("node", NodeKind::Empty);
    scene.set_rotation(node, Vector3::new(0.0, 0.0, 0.0));
    let t = &scene.node(node).transform;
    // Zero yaw and pitch looks down negative x in this parameterization.
    assert!((t.forward.x + 1.0).abs() < 1e-6);
    assert!(t.forward.y.abs() < 1e-6);
    assert!(t.forward.z.abs() < 1e-6);
    let expected_right = t.forward.cross(t.up);
    assert_eq!(t.right, expected_right);
}

#[test]
fn camera_world_matrix_is_a_view_matrix() {
    let mut scene = Scene::new();
    let camera = scene.add("camera", NodeKind::Camera(CameraData::default()));
    scene.set_position(camera, Vector3::new(0.0, 0.0, 5.0));
    scene.set_rotation(camera, Vector3::new(0.0, 0.0, 0.0));

    let view = scene.view_matrix(camera);
    // A view matrix moves the camera to the origin: transforming the camera
    // position by it must land on (0, 0, 0).
    let p = view * cgmath::Vector4::new(0.0, 0.0, 5.0, 1.0);
    assert!(p.x.abs() < 1e-5 && p.y.abs() < 1e-5 && p.z.abs() < 1e-5);

    // Cached like any other node.
    let first: [[f32; 4]; 4] = view.into();
    let second: [[f32; 4]; 4] = scene.view_matrix(camera).into();
    assert_eq!(first, second);
}

#[test]
fn disabled_nodes_keep_their_transforms() {
    let mut scene = Scene::new();
    let node = scene.add("node", NodeKind::Empty);
    scene.set_position(node, Vector3::new(1.0, 1.0, 1.0));
    scene.set_enabled(node, false);
    assert!(!scene.is_enabled(node));
    assert_eq!(scene.world_matrix(node).w.x, 1.0);
}
