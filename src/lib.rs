//! lumen-ngin
//!
//! A lightweight real-time 3D rendering framework built on wgpu. The crate
//! provides object/scene abstractions (scene graph, meshes, materials,
//! shaders, textures, framebuffers, cameras) with a lazy GPU resource
//! lifecycle: buffers and textures are generated on first use, resized in
//! place and released when dropped. Rendering is strictly single threaded
//! and driven by a fixed tick loop.
//!
//! High-level modules
//! - `context`: central GPU and window context that owns device/queue/surface
//! - `data_structures`: scene graph, cameras, geometry, textures, framebuffers
//! - `material`: graphic pipeline state, uniform tables and texture slots
//! - `shader`: `#stage` shader parsing, render and compute programs
//! - `renderer`: the application loop, time accounting and render state
//! - `render`: per-frame pass composition (bind/clear/draw/blit primitives)
//! - `resources`: mesh (OBJ/PLY) and image import, panorama conversion
//!

pub mod context;
pub mod data_structures;
pub mod material;
pub mod render;
pub mod renderer;
pub mod resources;
pub mod shader;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use wgpu;
pub use winit::event::WindowEvent;
