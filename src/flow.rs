//! The application event loop and frame tick.
//!
//! The loop has exactly one state: running. Each frame it measures the
//! elapsed time, advances every mixer that exists by elapsed × its speed
//! scalar, updates the orbit controller and renders shadow, main and panel
//! passes.
//!
//! Asset loads are fire-and-forget: every model (and the panorama) is
//! loaded in its own detached task and posts its result back through the
//! event-loop proxy. A failed load logs a warning and leaves its slot empty
//! forever; the tick's null checks make that a silent no-op.

use std::{iter, sync::Arc};

use instant::Instant;

use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    context::Context,
    data_structures::{scene_graph::SceneNode, texture::Texture},
    gui::SpeedPanel,
    pipelines::sky::Environment,
    resources::{self, EnvironmentData, LoadedModel},
    scene::{self, ModelSlot, SceneState},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Uniform scale applied to every loaded model.
pub const MODEL_SCALE: f32 = 5.0;

/// Panorama used as backdrop and ambient tint.
pub const PANORAMA_ASSET: &str = "qwantani_sunset_puresky_2k.hdr";

/// The four model assets of the scene and which slot each one fills.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    BananaScene,
    Banana,
    BirdBanana,
    FlyingBird,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::BananaScene,
        ModelKind::Banana,
        ModelKind::BirdBanana,
        ModelKind::FlyingBird,
    ];

    pub fn asset_path(&self) -> &'static str {
        match self {
            ModelKind::BananaScene => "models/model_monkey_banana_Scene.glb",
            ModelKind::Banana => "models/model_monkey_banana.glb",
            ModelKind::BirdBanana => "models/model_vogel_banane.glb",
            ModelKind::FlyingBird => "models/model_vogel_fliegen.glb",
        }
    }

    /// The clip each model should play, by exact name. The background scene
    /// has no preference and takes whatever clip comes first.
    pub fn target_clip(&self) -> Option<&'static str> {
        match self {
            ModelKind::BananaScene => None,
            ModelKind::Banana => Some("Banana_Schwanken_Y"),
            ModelKind::BirdBanana => Some("Vogel_Banane_Schwingen"),
            ModelKind::FlyingBird => Some("Vogel_Fliegen"),
        }
    }
}

pub(crate) enum FlowEvent {
    // This is the message from our wasm `spawn_local` initialization
    #[cfg(target_arch = "wasm32")]
    Initialized(Box<AppState>),
    ModelLoaded {
        kind: ModelKind,
        model: LoadedModel,
    },
    EnvironmentLoaded(EnvironmentData),
}

/// Application state bundle: GPU context, scene state, control panel.
pub(crate) struct AppState {
    ctx: Context,
    scene: SceneState,
    panel: SpeedPanel,
    is_surface_configured: bool,
}

impl AppState {
    async fn new(window: Arc<Window>) -> Self {
        let ctx = Context::new(window).await;
        let ctx = match ctx {
            Ok(ctx) => ctx,
            Err(e) => panic!(
                "App initialization failed. Cannot create the main context: {}",
                e
            ),
        };
        let panel = SpeedPanel::new(&ctx.window, &ctx.device, ctx.config.format);
        let mut scene = SceneState::default();
        scene.floor = Some(scene::mk_floor(&ctx.device, &ctx.queue));
        Self {
            ctx,
            scene,
            panel,
            is_surface_configured: false,
        }
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

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
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

        let mut encoder: wgpu::CommandEncoder =
            self.ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Render Encoder"),
                });

        // Shadow pass: depth of all casters from the light's point of view
        {
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.light.shadow_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            shadow_pass.set_pipeline(&self.ctx.pipelines.shadow);
            shadow_pass.set_bind_group(0, &self.ctx.light.bind_group, &[]);
            for slot in self.scene.slots() {
                slot.node.draw_shadow(&mut shadow_pass);
            }
        }

        // Main pass: floor and models, then the sky behind everything
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
            });

            render_pass.set_pipeline(&self.ctx.pipelines.model);
            render_pass.set_bind_group(3, &self.ctx.light.shadow_map_bind_group, &[]);
            if let Some(floor) = &self.scene.floor {
                floor.draw(
                    &self.ctx.camera.bind_group,
                    &self.ctx.light.bind_group,
                    &mut render_pass,
                );
            }
            for slot in self.scene.slots() {
                slot.node.draw(
                    &self.ctx.camera.bind_group,
                    &self.ctx.light.bind_group,
                    &mut render_pass,
                );
            }

            if let Some(environment) = &self.scene.environment {
                render_pass.set_pipeline(&self.ctx.pipelines.sky);
                render_pass.set_bind_group(0, &self.ctx.camera.bind_group, &[]);
                render_pass.set_bind_group(1, &environment.bind_group, &[]);
                render_pass.draw(0..3, 0..1);
            }
        }

        self.panel.render(
            &self.ctx.window,
            &self.ctx.device,
            &self.ctx.queue,
            &mut encoder,
            &view,
            [self.ctx.config.width, self.ctx.config.height],
            &mut self.scene.speeds,
        );

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<FlowEvent>,
    state: Option<AppState>,
    last_time: Instant,
}

impl App {
    fn new(event_loop: &EventLoop<FlowEvent>) -> Self {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new().unwrap();
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            state: None,
            last_time: Instant::now(),
        }
    }

    /// Kick off all asset loads, each in its own detached task. Nothing
    /// waits on anything: results arrive through the proxy in whatever
    /// order the loads finish.
    fn spawn_asset_loads(&self, ctx: &Context) {
        for kind in ModelKind::ALL {
            let device = ctx.device.clone();
            let queue = ctx.queue.clone();
            let proxy = self.proxy.clone();
            let load = async move {
                match resources::load_model_gltf(kind.asset_path(), &device, &queue).await {
                    Ok(model) => {
                        if proxy
                            .send_event(FlowEvent::ModelLoaded { kind, model })
                            .is_err()
                        {
                            log::error!("event loop closed before {:?} arrived", kind);
                        }
                    }
                    // the slot stays empty, the frame loop carries on
                    Err(e) => log::warn!("failed to load {}: {}", kind.asset_path(), e),
                }
            };
            #[cfg(not(target_arch = "wasm32"))]
            self.async_runtime.spawn(load);
            #[cfg(target_arch = "wasm32")]
            wasm_bindgen_futures::spawn_local(load);
        }

        let proxy = self.proxy.clone();
        let load = async move {
            match resources::load_environment(PANORAMA_ASSET).await {
                Ok(data) => {
                    if proxy.send_event(FlowEvent::EnvironmentLoaded(data)).is_err() {
                        log::error!("event loop closed before the panorama arrived");
                    }
                }
                Err(e) => log::warn!("failed to load {}: {}", PANORAMA_ASSET, e),
            }
        };
        #[cfg(not(target_arch = "wasm32"))]
        self.async_runtime.spawn(load);
        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(load);
    }

    fn install_model(state: &mut AppState, kind: ModelKind, model: LoadedModel) {
        let mut slot = ModelSlot::new(model, kind.target_clip(), MODEL_SCALE);
        match slot.mixer.active_clip() {
            Some(clip) => log::debug!("{:?} plays {:?}", kind, clip),
            None => log::debug!("{:?} has no animations and stays static", kind),
        }
        slot.node.write_to_buffers(&state.ctx.queue);
        let slots = &mut state.scene.models;
        match kind {
            ModelKind::BananaScene => slots.banana_scene = Some(slot),
            ModelKind::Banana => slots.banana = Some(slot),
            ModelKind::BirdBanana => slots.bird_banana = Some(slot),
            ModelKind::FlyingBird => slots.flying_bird = Some(slot),
        }
    }

    fn install_environment(state: &mut AppState, data: EnvironmentData) {
        let texture = match Texture::from_hdr_pixels(
            &state.ctx.device,
            &state.ctx.queue,
            &data.pixels,
            data.width,
            data.height,
            PANORAMA_ASSET,
        ) {
            Ok(texture) => texture,
            Err(e) => {
                log::warn!("failed to upload {}: {}", PANORAMA_ASSET, e);
                return;
            }
        };
        let environment = Environment::new(
            &state.ctx.device,
            &state.ctx.environment_layout,
            texture,
            data.average,
        );
        state
            .ctx
            .light
            .set_ambient(&state.ctx.queue, environment.average);
        state.scene.environment = Some(environment);
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes();

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

        let window = Arc::new(event_loop.create_window(window_attributes).unwrap());

        #[cfg(not(target_arch = "wasm32"))]
        {
            let app_state = self.async_runtime.block_on(AppState::new(window));
            self.spawn_asset_loads(&app_state.ctx);
            self.state = Some(app_state);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let app_state = AppState::new(window).await;
                assert!(
                    proxy
                        .send_event(FlowEvent::Initialized(Box::new(app_state)))
                        .is_ok()
                );
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            #[cfg(target_arch = "wasm32")]
            FlowEvent::Initialized(state) => {
                self.state = Some(*state);

                // Important: Trigger a resize and redraw now that we are initialized
                let app_state = self.state.as_mut().unwrap();
                let size = app_state.ctx.window.inner_size();
                app_state.resize(size.width, size.height);
                self.spawn_asset_loads(&app_state.ctx);
                app_state.ctx.window.request_redraw();
            }
            FlowEvent::ModelLoaded { kind, model } => {
                if let Some(state) = &mut self.state {
                    Self::install_model(state, kind, model);
                }
            }
            FlowEvent::EnvironmentLoaded(data) => {
                if let Some(state) = &mut self.state {
                    Self::install_environment(state, data);
                }
            }
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            state.ctx.camera.controller.handle_mouse(dx, dy);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        // the panel gets first pick so slider drags don't orbit the camera
        let consumed = state.panel.handle_window_event(&state.ctx.window, &event);
        if !consumed {
            state.ctx.camera.controller.handle_window_events(&event);
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                // Fixed tick order: animations, camera, uniforms, render.
                state.scene.advance(dt);

                state
                    .ctx
                    .camera
                    .controller
                    .update(&mut state.ctx.camera.camera, dt);
                state
                    .ctx
                    .camera
                    .uniform
                    .update_view_proj(&state.ctx.camera.camera, &state.ctx.projection);
                state.ctx.queue.write_buffer(
                    &state.ctx.camera.buffer,
                    0,
                    bytemuck::cast_slice(&[state.ctx.camera.uniform]),
                );

                for slot in state.scene.slots_mut() {
                    slot.node.write_to_buffers(&state.ctx.queue);
                }

                match state.render() {
                    Ok(_) => {}
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
            _ => {}
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;

    let mut app = App::new(&event_loop);

    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() {
    run().expect_throw("failed to start the scene");
}
