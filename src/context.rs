//! Central GPU and window context.

use std::sync::Arc;

use anyhow::{Context as _, anyhow};
use winit::window::Window;

use crate::data_structures::Extent2d;
use crate::data_structures::framebuffer::{DEPTH_FORMAT, Renderbuffer};
use crate::renderer::RenderState;

/// Owns the window, surface, device and queue plus the default render
/// targets. Everything that draws borrows from here.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub(crate) depth: Renderbuffer,
    pub clear_color: wgpu::Color,
    pub render_state: RenderState,
}

impl Context {
    /// Set up the GPU stack for a window.
    ///
    /// This is the one fatal initialization path: no adapter, no device or
    /// no surface means the application cannot run, so errors propagate out
    /// instead of degrading.
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("wgpu setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create a rendering surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow!("no compatible graphics adapter: {e}"))?;

        log::info!("device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to acquire a graphics device")?;

        // Validation errors trap hard during development, release builds
        // only log them.
        #[cfg(debug_assertions)]
        device.on_uncaptured_error(Arc::new(|error| {
            log::error!("uncaptured wgpu error: {}", error);
            panic!("uncaptured wgpu error: {}", error);
        }));
        #[cfg(not(debug_assertions))]
        device.on_uncaptured_error(Arc::new(|error| {
            log::error!("uncaptured wgpu error: {}", error);
        }));

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let mut depth = Renderbuffer::new(DEPTH_FORMAT, 1);
        depth.extent = Extent2d::new(config.width, config.height);
        depth.generate(&device);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth,
            clear_color: wgpu::Color {
                r: 0.1,
                g: 0.1,
                b: 0.1,
                a: 1.0,
            },
            render_state: RenderState::default(),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn extent(&self) -> Extent2d {
        Extent2d::new(self.config.width, self.config.height)
    }

    /// Reconfigure the surface and the default depth target. Zero sizes
    /// (minimized windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth.resize(&self.device, Extent2d::new(width, height));
    }
}
