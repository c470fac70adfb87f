//! snow-globe
//!
//! A small diorama rendered with wgpu on native targets and in the browser:
//! two animated avatars on a floor inside a glass globe, a radio playing
//! positional audio, a procedural antenna and a rotating star field under a
//! cubemap sky.
//!
//! High-level modules
//! - `animation`: clip sampling and the cross-fading blender
//! - `audio`: ambient and positional sources behind a command queue
//! - `camera`: orbit camera, controller, uniforms and the immersive pose
//! - `config`: scene tunables
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: meshes, materials, instances, textures and the scene graph
//! - `flow`: the event loop and the [`flow::GraphicsFlow`] hooks
//! - `panel`: control panel layout and key bindings
//! - `pipelines`: render pipelines and their bind group layouts
//! - `render`: render composition for efficient pipeline reuse
//! - `resources`: fetching and decoding assets, load progress
//! - `scene`: the snow globe itself, headless state plus its GPU mirror
//! - `stats`: frame timing shown in the window title
//!

pub mod animation;
pub mod audio;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod logging;
pub mod panel;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
pub mod stats;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use config::SceneConfig;
pub use error::SceneError;
pub use scene::{SceneContext, globe::SnowGlobe};
pub use winit::event::DeviceEvent;
pub use winit::event::WindowEvent;

/// Starts the globe with the default configuration.
pub fn run() -> anyhow::Result<()> {
    let config = SceneConfig::from_env();
    flow::run(config.clone(), vec![SnowGlobe::constructor(config)])
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() -> Result<(), wasm_bindgen::JsValue> {
    logging::init_logging(logging::LoggingConfig::default());
    run().map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{e:#}")))
}
