//! Flow control and application event loop.
//!
//! A "flow" is a self-contained scene that handles input, updates its state
//! and describes what to draw each frame. The engine owns the window and the
//! GPU [`Context`], forwards events to every flow and renders their combined
//! [`Render`] trees.
//!
//! # User-facing types
//!
//! - [`GraphicsFlow<E>`] is the trait for scenes that handle events and rendering
//! - [`Out<E>`] is the output of every hook: background work or context changes
//!
//! # Lifecycle
//!
//! Each frame:
//! 1. Collect window/device events and hand them to the flows
//! 2. Move the camera and upload its uniform
//! 3. Call `on_update` on every flow
//! 4. Collect every flow's `on_render` and draw the batches
//! 5. Call `on_tick` once `tick_duration_millis` have passed
//!
//! Background work returned as [`Out::Spawn`] runs while frames keep being
//! drawn; every item it yields comes back through `on_custom_events`.

use std::{fmt::Debug, iter, pin::Pin, sync::Arc};

use futures::{StreamExt, stream::LocalBoxStream};
use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    config::SceneConfig,
    context::{Context, InitContext, MouseButtonState},
    data_structures::texture::Texture,
    render::{Batches, Render},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub const WINDOW_TITLE: &str = "Snow Globe";

/// Builds a background event stream. Natively the stream is built and driven
/// on a worker thread, so only the builder has to be `Send`.
#[cfg(not(target_arch = "wasm32"))]
pub type Spawner<E> = Box<dyn FnOnce() -> LocalBoxStream<'static, E> + Send>;
#[cfg(target_arch = "wasm32")]
pub type Spawner<E> = Box<dyn FnOnce() -> LocalBoxStream<'static, E>>;

#[cfg(not(target_arch = "wasm32"))]
pub fn spawner<E, S, F>(make: F) -> Spawner<E>
where
    F: FnOnce() -> S + Send + 'static,
    S: futures::Stream<Item = E> + 'static,
{
    Box::new(move || make().boxed_local())
}

#[cfg(target_arch = "wasm32")]
pub fn spawner<E, S, F>(make: F) -> Spawner<E>
where
    F: FnOnce() -> S + 'static,
    S: futures::Stream<Item = E> + 'static,
{
    Box::new(move || make().boxed_local())
}

///
/// This is the Output Type for every lifecycle hook.
///
/// `Out::Spawn` starts background streams. Every item they yield is put in the
/// event queue and handed to `on_custom_events`; the streams never block a
/// frame.
///
/// `Out::Configure` can be used to modify the Context during runtime, for
/// instance to move the camera or change the clear colour.
///
/// `Exit` asks the event loop to shut down once the current event is handled.
///
/// `Empty` is the default output used when nothing needs to be handled.
///
pub enum Out<E> {
    Spawn(Vec<Spawner<E>>),
    Configure(Box<dyn FnOnce(&mut Context)>),
    Exit,
    Empty,
}

impl<E> Default for Out<E> {
    fn default() -> Self {
        Self::Empty
    }
}

/// Trait for implementing a renderable scene.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once when the flow is created
/// 2. `on_window_events()` and `on_device_events()` are called for each winit input event
/// 3. `on_update()` is called every frame, before rendering
/// 4. `on_tick()` is called every `tick_duration_millis`
/// 5. `on_custom_events()` is called for items produced by spawned streams
/// 6. `on_render()` is called each frame and specifies how to render `self`
///
pub trait GraphicsFlow<E> {
    /// Initialize the flow and configure the context.
    fn on_init(&mut self, ctx: &mut Context) -> Out<E>;

    /// Update state every frame. `dt` is the time since the previous frame.
    fn on_update(&mut self, ctx: &Context, dt: Duration) -> Out<E>;

    /// Called every `tick_duration_millis` milliseconds.
    fn on_tick(&mut self, ctx: &Context) -> Out<E>;

    fn on_device_events(&mut self, ctx: &Context, event: &DeviceEvent) -> Out<E>;

    fn on_window_events(&mut self, ctx: &Context, event: &WindowEvent) -> Out<E>;

    /// Handle custom application events.
    ///
    /// Returns the event if it was not consumed, allowing it to be passed to
    /// the next flow. Returning `None` means the event was consumed.
    fn on_custom_events(&mut self, ctx: &Context, event: E) -> Option<E>;

    /// Return renderable objects for this flow.
    fn on_render(&self) -> Render<'_>;
}

impl<E> Debug for dyn GraphicsFlow<E> + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GraphicsFlow")
    }
}

/// Type alias for a flow constructor (factory function).
///
/// A flow constructor takes an `InitContext` and asynchronously returns a
/// boxed `GraphicsFlow`.
pub type FlowConstructor<E> =
    Box<dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = Box<dyn GraphicsFlow<E>>>>>>;

/// GPU context plus surface status.
#[derive(Debug)]
pub struct AppState {
    pub(crate) ctx: Context,
    is_surface_configured: bool,
}

impl AppState {
    async fn new(window: Arc<Window>, config: &SceneConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window, config).await?;
        Ok(Self {
            ctx,
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.is_surface_configured = true;
            self.ctx.projection.resize(width, height);
            self.ctx
                .surface
                .configure(&self.ctx.device, &self.ctx.config);
            self.ctx.depth_texture = Texture::create_depth_texture(
                &self.ctx.device,
                [self.ctx.config.width, self.ctx.config.height],
                "depth_texture",
            );
        }
    }

    fn update_camera(&mut self, dt: Duration) {
        let camera = &mut self.ctx.camera;
        camera.controller.update(&mut camera.camera, dt);
        camera
            .uniform
            .update_view_proj(&camera.camera, &self.ctx.projection);
        self.ctx
            .queue
            .write_buffer(&camera.buffer, 0, bytemuck::cast_slice(&[camera.uniform]));
        self.ctx.light.write(&self.ctx.queue);
    }

    fn render<E>(&mut self, graphics_flows: &[Box<dyn GraphicsFlow<E>>]) -> Result<(), wgpu::SurfaceError> {
        // invoke main render loop
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut batches = Batches::default();
        graphics_flows
            .iter()
            .for_each(|flow| flow.on_render().set_pipelines(&mut batches));

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            // cleared every frame so a scene without casters is fully lit
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.light.shadow.texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            batches.draw_shadows(&self.ctx, &mut shadow_pass);
        }
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            batches.draw(&self.ctx, &mut render_pass);
        }
        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

pub(crate) enum FlowEvent<E: 'static> {
    #[cfg(target_arch = "wasm32")]
    Initialized {
        state: AppState,
        flows: Vec<Box<dyn GraphicsFlow<E>>>,
    },
    Custom(E),
    Exit,
}

impl<E> Debug for FlowEvent<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(target_arch = "wasm32")]
            Self::Initialized { state: _, flows } => {
                f.debug_struct("Initialized").field("flows", flows).finish()
            }
            Self::Custom(_) => f.write_str("Custom(E)"),
            Self::Exit => f.write_str("Exit"),
        }
    }
}

pub struct App<E: 'static> {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<FlowEvent<E>>,
    config: SceneConfig,
    state: Option<AppState>,
    // This will hold the fully initialized flows once they are ready.
    graphics_flows: Vec<Box<dyn GraphicsFlow<E>>>,
    // We use Option to `take()` the constructors after use.
    constructors: Option<Vec<FlowConstructor<E>>>,
    last_time: Instant,
    time_since_tick: Duration,
}

impl<E: Send + 'static> App<E> {
    fn new(
        event_loop: &EventLoop<FlowEvent<E>>,
        config: SceneConfig,
        constructors: Vec<FlowConstructor<E>>,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            config,
            state: None,
            graphics_flows: Vec::new(),
            constructors: Some(constructors),
            last_time: Instant::now(),
            time_since_tick: Duration::from_millis(0),
        })
    }

    fn handle(&mut self, out: Out<E>) {
        if let Some(state) = &mut self.state {
            handle_flow_output(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                &mut state.ctx,
                self.proxy.clone(),
                out,
            );
        }
    }

    fn init_flows(&mut self) {
        let Some(state) = &mut self.state else {
            return;
        };
        let size = state.ctx.window.inner_size();
        state.resize(size.width, size.height);
        let outs: Vec<_> = self
            .graphics_flows
            .iter_mut()
            .map(|flow| flow.on_init(&mut state.ctx))
            .collect();
        outs.into_iter().for_each(|out| self.handle(out));
        if let Some(state) = &self.state {
            state.ctx.window.request_redraw();
        }
    }

    fn redraw(&mut self) {
        let dt = self.last_time.elapsed();
        self.last_time = Instant::now();
        self.time_since_tick += dt;

        let Some(state) = &mut self.state else {
            return;
        };
        state.update_camera(dt);
        let outs: Vec<_> = self
            .graphics_flows
            .iter_mut()
            .map(|f| f.on_update(&state.ctx, dt))
            .collect();
        outs.into_iter().for_each(|out| self.handle(out));

        let Some(state) = &mut self.state else {
            return;
        };
        match state.render(&self.graphics_flows) {
            Ok(()) => {
                if self.time_since_tick >= Duration::from_millis(state.ctx.tick_duration_millis) {
                    self.time_since_tick = Duration::from_millis(0);
                    let outs: Vec<_> = self
                        .graphics_flows
                        .iter_mut()
                        .map(|f| f.on_tick(&state.ctx))
                        .collect();
                    outs.into_iter().for_each(|out| self.handle(out));
                }
            }
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = state.ctx.window.inner_size();
                state.resize(size.width, size.height);
            }
            Err(e) => {
                log::error!("Unable to render {}", e);
            }
        }
    }
}

impl<E: Send + 'static> ApplicationHandler<FlowEvent<E>> for App<E> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(constructors) = self.constructors.take() else {
            // already initialized
            return;
        };
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(WINDOW_TITLE);
        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;
            const CANVAS_ID: &str = "canvas";
            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("could not create a window: {e}");
                event_loop.exit();
                return;
            }
        };
        let config = self.config.clone();
        let init_future = async move {
            let app_state = AppState::new(window, &config).await?;
            let flow_futures: Vec<_> = constructors
                .into_iter()
                .map(|constructor| constructor(app_state.ctx.init_context()))
                .collect();
            let flows: Vec<_> = futures::future::join_all(flow_futures).await;
            anyhow::Ok((app_state, flows))
        };
        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok((app_state, flows)) => {
                    self.state = Some(app_state);
                    self.graphics_flows = flows;
                    self.init_flows();
                }
                Err(e) => {
                    log::error!("App initialization failed: {e:#}");
                    event_loop.exit();
                }
            }
        }
        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match init_future.await {
                    Ok((state, flows)) => {
                        if proxy
                            .send_event(FlowEvent::Initialized { state, flows })
                            .is_err()
                        {
                            log::error!("event loop closed during initialization");
                        }
                    }
                    Err(e) => log::error!("App initialization failed: {e:#}"),
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent<E>) {
        match event {
            #[cfg(target_arch = "wasm32")]
            FlowEvent::Initialized { state, flows } => {
                // This is the message from our wasm `spawn_local`
                self.state = Some(state);
                self.graphics_flows = flows;
                self.init_flows();
            }
            FlowEvent::Custom(custom_event) => {
                if let Some(state) = &mut self.state {
                    let result = self
                        .graphics_flows
                        .iter_mut()
                        .fold(Some(custom_event), |event, flow| {
                            flow.on_custom_events(&state.ctx, event?)
                        });
                    if result.is_some() {
                        log::warn!("Custom event was not consumed this cycle");
                    }
                }
            }
            FlowEvent::Exit => {
                event_loop.exit();
            }
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        let Some(state) = &mut self.state else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            let speed_factor = 5.0;
            if state.ctx.mouse.pressed != MouseButtonState::None {
                state
                    .ctx
                    .camera
                    .controller
                    .handle_mouse(dx * speed_factor, dy * speed_factor);
            }
        }
        let outs: Vec<_> = self
            .graphics_flows
            .iter_mut()
            .map(|f| f.on_device_events(&state.ctx, &event))
            .collect();
        outs.into_iter().for_each(|out| self.handle(out));
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };
        state.ctx.camera.controller.handle_window_events(&event);
        match &event {
            WindowEvent::CursorMoved { position, .. } => state.ctx.mouse.coords = *position,
            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => {
                state.ctx.mouse.pressed = match (button, button_state.is_pressed()) {
                    (MouseButton::Left, true) => MouseButtonState::Left,
                    (MouseButton::Right, true) => MouseButtonState::Right,
                    (_, false) => MouseButtonState::None,
                    _ => state.ctx.mouse.pressed,
                };
            }
            _ => (),
        }
        let outs: Vec<_> = self
            .graphics_flows
            .iter_mut()
            .map(|f| f.on_window_events(&state.ctx, &event))
            .collect();
        outs.into_iter().for_each(|out| self.handle(out));

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    state.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }
}

fn handle_flow_output<E: Send + 'static>(
    #[cfg(not(target_arch = "wasm32"))] async_runtime: &tokio::runtime::Runtime,
    ctx: &mut Context,
    proxy: EventLoopProxy<FlowEvent<E>>,
    out: Out<E>,
) {
    match out {
        // Forward every item of every stream to winit
        Out::Spawn(spawners) => {
            for spawner in spawners {
                let proxy = proxy.clone();
                let forward = move |stream: LocalBoxStream<'static, E>| async move {
                    let mut stream = stream;
                    while let Some(event) = stream.next().await {
                        if proxy.send_event(FlowEvent::Custom(event)).is_err() {
                            log::warn!("event loop closed before a background stream finished");
                            break;
                        }
                    }
                };
                #[cfg(not(target_arch = "wasm32"))]
                {
                    let handle = async_runtime.handle().clone();
                    async_runtime.spawn_blocking(move || handle.block_on(forward(spawner())));
                }
                #[cfg(target_arch = "wasm32")]
                {
                    wasm_bindgen_futures::spawn_local(forward(spawner()));
                }
            }
        }
        Out::Configure(f) => f(ctx),
        Out::Exit => {
            if proxy.send_event(FlowEvent::Exit).is_err() {
                log::warn!("event loop already closed");
            }
        }
        Out::Empty => (),
    }
}

pub fn run<E: Send + 'static>(
    config: SceneConfig,
    constructors: Vec<FlowConstructor<E>>,
) -> anyhow::Result<()> {
    let event_loop: EventLoop<FlowEvent<E>> = EventLoop::with_user_event().build()?;

    let mut app: App<E> = App::new(&event_loop, config, constructors)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
