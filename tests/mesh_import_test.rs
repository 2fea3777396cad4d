use lumen_ngin::data_structures::geometry::Vertex;
use lumen_ngin::resources::mesh::{dedup_vertices, load_obj, load_ply};

const CUBE_OBJ: &str = "\
v -1 -1 -1
v 1 -1 -1
v 1 1 -1
v -1 1 -1
v -1 -1 1
v 1 -1 1
v 1 1 1
v -1 1 1
f 1 2 3 4
f 5 8 7 6
f 1 5 6 2
f 2 6 7 3
f 3 7 8 4
f 5 1 4 8
";

const TRIANGLE_PLY: &str = "\
ply
format ascii 1.0
element vertex 3
property float x
property float y
property float z
property uchar red
property uchar green
property uchar blue
element face 1
property list uchar int vertex_indices
end_header
0 0 0 255 0 0
1 0 0 0 255 0
0 1 0 0 0 255
3 0 1 2
";

fn write_fixture(name: &str, contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Runtime::new().unwrap().block_on(future)
}

#[test]
fn obj_cube_dedups_shared_corners() {
    let path = write_fixture("lumen_ngin_cube.obj", CUBE_OBJ);
    let geometry = block_on(load_obj(&path)).unwrap();

    // Without normals or texcoords every face corner at the same position
    // is the same vertex: 8 unique vertices, 6 quads -> 12 triangles.
    assert_eq!(geometry.vertices.len(), 8);
    assert_eq!(geometry.indices.len(), 36);
    assert_eq!(geometry.draw_count(), 36);
    assert!(!geometry.is_generated());

    for &index in &geometry.indices {
        assert!((index as usize) < geometry.vertices.len());
    }
}

#[test]
fn dedup_collapses_equal_corners_only() {
    let a = Vertex {
        position: [0.0, 0.0, 0.0],
        ..Default::default()
    };
    let b = Vertex {
        position: [1.0, 0.0, 0.0],
        ..Default::default()
    };
    // Same position as `a` but a different normal stays separate.
    let a_other_normal = Vertex {
        normal: [0.0, 1.0, 0.0],
        ..a
    };
    let (vertices, indices) = dedup_vertices(&[a, b, a, a_other_normal]);
    assert_eq!(vertices.len(), 3);
    assert_eq!(indices, vec![0, 1, 0, 2]);
}

#[test]
fn ply_ascii_triangle_with_colors() {
    let path = write_fixture("lumen_ngin_triangle.ply", TRIANGLE_PLY);
    let geometry = block_on(load_ply(&path)).unwrap();

    assert_eq!(geometry.vertices.len(), 3);
    assert_eq!(geometry.indices, vec![0, 1, 2]);
    assert_eq!(geometry.vertices[0].position, [0.0, 0.0, 0.0]);
    assert_eq!(geometry.vertices[1].position, [1.0, 0.0, 0.0]);
    // uchar colors normalize to [0, 1].
    assert_eq!(geometry.vertices[0].color, [1.0, 0.0, 0.0]);
    assert_eq!(geometry.vertices[1].color, [0.0, 1.0, 0.0]);
    assert_eq!(geometry.vertices[2].color, [0.0, 0.0, 1.0]);
}

#[test]
fn ply_with_crlf_line_endings_loads() {
    let crlf = TRIANGLE_PLY.replace('\n', "\r\n");
    let path = write_fixture("lumen_ngin_triangle_crlf.ply", &crlf);
    let geometry = block_on(load_ply(&path)).unwrap();

    assert_eq!(geometry.vertices.len(), 3);
    assert_eq!(geometry.indices, vec![0, 1, 2]);
    assert_eq!(geometry.vertices[1].position, [1.0, 0.0, 0.0]);
}

#[test]
fn ply_quad_faces_triangulate() {
    let quad_ply = "\
ply
format ascii 1.0
element vertex 4
property float x
property float y
property float z
element face 1
property list uchar int vertex_indices
end_header
0 0 0
1 0 0
1 1 0
0 1 0
4 0 1 2 3
";
    let path = write_fixture("lumen_ngin_quad.ply", quad_ply);
    let geometry = block_on(load_ply(&path)).unwrap();
    assert_eq!(geometry.vertices.len(), 4);
    assert_eq!(geometry.indices, vec![0, 1, 2, 0, 2, 3]);
}

#[test]
fn missing_files_are_errors() {
    assert!(block_on(load_obj("/nonexistent/mesh.obj")).is_err());
    assert!(block_on(load_ply("/nonexistent/mesh.ply")).is_err());
}
