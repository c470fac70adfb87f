//! The snow globe flow: wires the headless [`SceneContext`] to the engine.
//!
//! Load completions arrive as custom events and are queued; the queue is
//! drained at the start of the next frame, before the scene ticks. Keyboard
//! input goes through the control panel's bindings; Escape quits the native
//! build.

use cgmath::EuclideanSpace;
use instant::Duration;
use winit::{
    event::{DeviceEvent, ElementState, KeyEvent, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use crate::{
    audio::{self, AudioOutput},
    config::SceneConfig,
    context::{Context, InitContext},
    flow::{FlowConstructor, GraphicsFlow, Out, WINDOW_TITLE, spawner},
    panel::PanelAction,
    render::Render,
    resources::{AssetSource, Completion},
    stats::FrameStats,
};

use super::{SceneContext, gpu::GpuScene, plan::AssetTarget};

/// Events the globe's background work produces.
#[derive(Debug)]
pub enum GlobeEvent {
    Loaded(Completion<AssetTarget>),
}

pub struct SnowGlobe {
    scene: SceneContext,
    gpu: GpuScene,
    pending: Vec<Completion<AssetTarget>>,
    stats: FrameStats,
    audio_out: Box<dyn AudioOutput>,
}

/// Closes the window. The browser build ignores it.
pub const QUIT_KEY: KeyCode = KeyCode::Escape;

impl SnowGlobe {
    pub fn new(config: SceneConfig) -> Self {
        Self::with_output(SceneContext::new(config), audio::default_output())
    }

    pub fn with_output(scene: SceneContext, audio_out: Box<dyn AudioOutput>) -> Self {
        Self {
            scene,
            gpu: GpuScene::new(),
            pending: Vec::new(),
            stats: FrameStats::new(),
            audio_out,
        }
    }

    /// A constructor for [`crate::flow::run`].
    pub fn constructor(config: SceneConfig) -> FlowConstructor<GlobeEvent> {
        let constructor: FlowConstructor<GlobeEvent> = Box::new(move |_: InitContext| {
            Box::pin(async move { Box::new(SnowGlobe::new(config)) as Box<dyn GraphicsFlow<GlobeEvent>> })
        });
        constructor
    }

    pub fn scene(&self) -> &SceneContext {
        &self.scene
    }

    fn title(&self) -> String {
        match self.scene.loading.screen_text() {
            Some(text) => format!("{WINDOW_TITLE} - {text}"),
            None => format!("{WINDOW_TITLE} - {}", self.stats.summary()),
        }
    }

    /// What a key press does: quit, a panel action, or nothing.
    pub fn on_key(&mut self, code: KeyCode) -> Out<GlobeEvent> {
        if code == QUIT_KEY && cfg!(not(target_arch = "wasm32")) {
            log::info!("quit requested");
            return Out::Exit;
        }
        match self.scene.panel.action_for_key(code) {
            Some(action) => self.on_action(action),
            None => Out::Empty,
        }
    }

    fn on_action(&mut self, action: PanelAction) -> Out<GlobeEvent> {
        self.scene.handle(action);
        if action != PanelAction::ToggleImmersive {
            return Out::Empty;
        }
        let immersive = self.scene.is_immersive();
        Out::Configure(Box::new(move |ctx: &mut Context| {
            if immersive {
                ctx.camera.enter_immersive();
            } else {
                ctx.camera.exit_immersive();
            }
        }))
    }
}

impl GraphicsFlow<GlobeEvent> for SnowGlobe {
    fn on_init(&mut self, ctx: &mut Context) -> Out<GlobeEvent> {
        ctx.clear_colour = self.scene.config.clear_colour;
        ctx.tick_duration_millis = self.scene.config.tick_duration_millis;
        ctx.set_title(&self.title());

        let source = match AssetSource::from_root(&self.scene.config.asset_root) {
            Ok(source) => source,
            Err(e) => {
                log::error!("no asset source, the scene stays empty: {e:#}");
                return Out::Empty;
            }
        };
        let spawners = self
            .scene
            .start_loading()
            .into_iter()
            .map(|task| {
                let source = source.clone();
                spawner(move || {
                    use futures::StreamExt;
                    task.into_stream(source).map(GlobeEvent::Loaded)
                })
            })
            .collect();
        Out::Spawn(spawners)
    }

    fn on_update(&mut self, ctx: &Context, dt: Duration) -> Out<GlobeEvent> {
        for completion in std::mem::take(&mut self.pending) {
            self.scene.complete(completion);
        }

        self.stats.record(dt);
        self.scene.tick(dt.as_secs_f32());
        self.scene.set_listener(ctx.camera.camera.eye().to_vec());
        self.scene.drain_audio(self.audio_out.as_mut());

        self.gpu.sync(ctx, &self.scene);
        Out::Empty
    }

    fn on_tick(&mut self, ctx: &Context) -> Out<GlobeEvent> {
        self.stats.sample();
        ctx.set_title(&self.title());
        Out::Empty
    }

    fn on_device_events(&mut self, _ctx: &Context, _event: &DeviceEvent) -> Out<GlobeEvent> {
        Out::Empty
    }

    fn on_window_events(&mut self, _ctx: &Context, event: &WindowEvent) -> Out<GlobeEvent> {
        let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state: ElementState::Pressed,
                    repeat: false,
                    ..
                },
            ..
        } = event
        else {
            return Out::Empty;
        };
        self.on_key(*code)
    }

    fn on_custom_events(&mut self, _ctx: &Context, event: GlobeEvent) -> Option<GlobeEvent> {
        match event {
            GlobeEvent::Loaded(completion) => self.pending.push(completion),
        }
        None
    }

    fn on_render(&self) -> Render<'_> {
        self.gpu.render(&self.scene)
    }
}

impl Drop for SnowGlobe {
    fn drop(&mut self) {
        self.scene.teardown();
        self.scene.drain_audio(self.audio_out.as_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::LogOutput;

    fn globe() -> SnowGlobe {
        SnowGlobe::with_output(SceneContext::new(SceneConfig::default()), Box::new(LogOutput))
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn escape_quits() {
        assert!(matches!(globe().on_key(QUIT_KEY), Out::Exit));
    }

    #[test]
    fn panel_keys_act_on_the_scene() {
        let mut globe = globe();
        assert!(matches!(globe.on_key(KeyCode::KeyT), Out::Empty));
        assert_eq!(globe.scene().rotation_speed(), 0.0);
        assert!(matches!(globe.on_key(KeyCode::KeyV), Out::Configure(_)));
        assert!(globe.scene().is_immersive());
        assert!(matches!(globe.on_key(KeyCode::KeyQ), Out::Empty));
    }
}
