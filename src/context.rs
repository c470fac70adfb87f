use std::sync::Arc;

use anyhow::Context as _;
use cgmath::Point3;
use winit::{dpi::PhysicalPosition, window::Window};

use crate::{
    camera::{self, CameraResources, Projection},
    config::SceneConfig,
    data_structures::texture,
    pipelines::{
        Layouts, Pipelines,
        light::{LightResources, LightUniform},
    },
};

/// Initial orbit camera pose.
pub const CAMERA_EYE: [f32; 3] = [100.0, 100.0, 120.0];
pub const CAMERA_FOVY_DEGREES: f32 = 50.0;
pub const CAMERA_ZNEAR: f32 = 0.1;
/// Far enough that the star shell is never clipped.
pub const CAMERA_ZFAR: f32 = 1000.0;
pub const CAMERA_MAX_DISTANCE: f32 = 450.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MouseButtonState {
    #[default]
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MouseState {
    pub pressed: MouseButtonState,
    pub coords: PhysicalPosition<f64>,
}

/// 1x1 textures bound to material slots whose image is missing.
#[derive(Debug)]
pub struct Fallbacks {
    /// Colour maps and sprites.
    pub white: texture::Texture,
    /// Roughness and occlusion maps.
    pub linear_white: texture::Texture,
    pub normal: texture::Texture,
}

impl Fallbacks {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            white: texture::Texture::default_white(device, queue),
            linear_white: texture::Texture::solid(device, queue, [255; 4], "linear white", false),
            normal: texture::Texture::default_normal_map(device, queue),
        }
    }
}

/// The GPU handles a flow receives while it is being constructed.
#[derive(Debug, Clone)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub layouts: Layouts,
    pub pipelines: Pipelines,
    pub fallbacks: Fallbacks,
    pub clear_colour: wgpu::Color,
    pub tick_duration_millis: u64,
    pub mouse: MouseState,
}

impl Context {
    pub async fn new(window: Arc<Window>, settings: &SceneConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("wgpu setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create the window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("snow-globe device"),
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders write linear colour and rely on an sRGB surface to encode it.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("no supported surface formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let [x, y, z] = CAMERA_EYE;
        let orbit = camera::Camera::looking_at(Point3::new(x, y, z), Point3::new(0.0, 0.0, 0.0));
        let projection = Projection::new(
            config.width,
            config.height,
            cgmath::Deg(CAMERA_FOVY_DEGREES),
            CAMERA_ZNEAR,
            CAMERA_ZFAR,
        );
        let controller = camera::CameraController::new(0.4, 0.1, CAMERA_MAX_DISTANCE);
        let camera = CameraResources::new(&device, orbit, controller, &projection);

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            "depth_texture",
        );

        let layouts = Layouts::new(&device);
        let light = LightResources::new(LightUniform::default(), &device, &layouts.shadow_pass);
        let pipelines = Pipelines::new(
            &device,
            &config,
            &layouts,
            &camera.bind_group_layout,
            &light.bind_group_layout,
        );
        let fallbacks = Fallbacks::new(&device, &queue);

        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            layouts,
            pipelines,
            fallbacks,
            clear_colour: settings.clear_colour,
            tick_duration_millis: settings.tick_duration_millis,
            mouse: MouseState::default(),
        })
    }

    pub fn init_context(&self) -> InitContext {
        InitContext {
            device: self.device.clone(),
            queue: self.queue.clone(),
            config: self.config.clone(),
        }
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}
