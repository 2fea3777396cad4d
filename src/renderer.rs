//! The application loop: window lifecycle, time accounting and the render
//! state tracker.
//!
//! User code implements [`Stage`] and hands it to [`run`]. The loop owns
//! window creation, context setup, resize plumbing and frame pacing;
//! rendering is strictly single threaded and driven by redraw requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::context::Context;
use crate::render::Frame;

/// Mirror of the pipeline state a material bind leaves behind, plus which
/// shader and textures are currently active.
///
/// The driver has no queryable global state, so the renderer keeps this
/// record itself. [`crate::material::Material::unbind`] clears only the
/// shader and texture entries; the fixed-function fields persist across
/// binds by design of the binding protocol.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderState {
    pub bound_shader: Option<String>,
    /// Slot index to sampler uniform name.
    pub bound_textures: BTreeMap<u32, String>,
    pub cull_face: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: wgpu::CompareFunction,
    pub blending: bool,
    pub blend_src: wgpu::BlendFactor,
    pub blend_dst: wgpu::BlendFactor,
    pub blend_op: wgpu::BlendOperation,
    pub alpha_to_coverage: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            bound_shader: None,
            bound_textures: BTreeMap::new(),
            cull_face: false,
            depth_test: false,
            depth_write: true,
            depth_func: wgpu::CompareFunction::Less,
            blending: false,
            blend_src: wgpu::BlendFactor::One,
            blend_dst: wgpu::BlendFactor::Zero,
            blend_op: wgpu::BlendOperation::Add,
            alpha_to_coverage: false,
        }
    }
}

/// Frame timing handed to the update hook.
#[derive(Clone, Copy, Debug, Default)]
pub struct Time {
    pub delta: Duration,
    /// Time since the loop started.
    pub elapsed: Duration,
    /// Smoothed frames per second.
    pub framerate: f32,
}

/// A renderable application stage.
///
/// # Lifecycle
///
/// 1. `on_init` runs once, after the context exists; load resources here
/// 2. `on_window_event` runs for every winit window event
/// 3. `on_update` runs every frame before drawing
/// 4. `on_draw` runs every frame with the acquired surface frame
pub trait Stage {
    fn on_init(&mut self, ctx: &mut Context);

    fn on_update(&mut self, _ctx: &mut Context, _time: &Time) {}

    fn on_draw(&mut self, ctx: &mut Context, frame: &mut Frame);

    fn on_window_event(&mut self, _ctx: &mut Context, _event: &WindowEvent) {}
}

pub struct App<S: Stage> {
    async_runtime: tokio::runtime::Runtime,
    stage: S,
    ctx: Option<Context>,
    is_surface_configured: bool,
    start_time: Instant,
    last_time: Instant,
    time: Time,
}

impl<S: Stage> App<S> {
    fn new(stage: S) -> Self {
        let async_runtime = tokio::runtime::Runtime::new().unwrap();
        Self {
            async_runtime,
            stage,
            ctx: None,
            is_surface_configured: false,
            start_time: Instant::now(),
            last_time: Instant::now(),
            time: Time::default(),
        }
    }

    fn redraw(&mut self) {
        let Some(ctx) = &mut self.ctx else {
            return;
        };

        let dt = self.last_time.elapsed();
        self.last_time = Instant::now();
        self.time.delta = dt;
        self.time.elapsed = self.start_time.elapsed();
        let secs = dt.as_secs_f32();
        if secs > 0.0 {
            self.time.framerate = self.time.framerate * 0.95 + (1.0 / secs) * 0.05;
        }

        self.stage.on_update(ctx, &self.time);

        if !self.is_surface_configured {
            return;
        }
        match Frame::new(ctx) {
            Ok(mut frame) => {
                self.stage.on_draw(ctx, &mut frame);
                frame.finish(ctx);
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = ctx.window.inner_size();
                ctx.resize(size.width, size.height);
            }
            Err(e) => log::error!("unable to render: {}", e),
        }
        ctx.window.request_redraw();
    }
}

impl<S: Stage> ApplicationHandler for App<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let window_attributes = Window::default_attributes();
        let window = Arc::new(event_loop.create_window(window_attributes).unwrap());

        let ctx = match self.async_runtime.block_on(Context::new(window)) {
            Ok(ctx) => ctx,
            Err(e) => panic!("cannot create the main context: {}", e),
        };
        self.ctx = Some(ctx);
        self.is_surface_configured = true;

        let ctx = self.ctx.as_mut().unwrap();
        self.stage.on_init(ctx);
        ctx.window.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        if let Some(ctx) = &mut self.ctx {
            self.stage.on_window_event(ctx, &event);
        }

        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(ctx) = &mut self.ctx {
                    ctx.resize(size.width, size.height);
                    self.is_surface_configured = size.width > 0 && size.height > 0;
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }
}

/// Run a stage until the window closes or Escape is pressed.
pub fn run<S: Stage>(stage: S) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    }

    let event_loop = EventLoop::new()?;
    let mut app = App::new(stage);
    event_loop.run_app(&mut app)?;

    Ok(())
}
