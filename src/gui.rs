//! The operator control panel: three animation-speed sliders drawn with
//! egui on top of the scene.

use winit::window::Window;

use crate::scene::{SpeedControls, SpeedScalar};

pub struct SpeedPanel {
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl SpeedPanel {
    pub fn new(window: &Window, device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer =
            egui_wgpu::Renderer::new(device, format, egui_wgpu::RendererOptions::default());

        Self {
            egui_ctx,
            egui_state,
            egui_renderer,
        }
    }

    /// Returns true when egui consumed the event (pointer over the panel),
    /// so camera input doesn't fight the sliders.
    pub fn handle_window_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> bool {
        self.egui_state.on_window_event(window, event).consumed
    }

    /// Run the panel UI and draw it over the finished frame.
    ///
    /// Slider changes are written straight into `speeds`; the frame tick
    /// picks them up on its next pass.
    pub fn render(
        &mut self,
        window: &Window,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        size: [u32; 2],
        speeds: &mut SpeedControls,
    ) {
        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            egui::Window::new("Animation")
                .title_bar(true)
                .resizable(false)
                .default_pos(egui::pos2(10.0, 10.0))
                .default_width(260.0)
                .show(ctx, |ui| {
                    speed_slider(ui, &mut speeds.banana, "Banana Speed");
                    speed_slider(ui, &mut speeds.bird_banana, "Bird Banana Speed");
                    speed_slider(ui, &mut speeds.flying_bird, "Flying Bird Speed");
                });
        });

        self.egui_state
            .handle_platform_output(window, full_output.platform_output);

        let tris = self
            .egui_ctx
            .tessellate(full_output.shapes, self.egui_ctx.pixels_per_point());
        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: size,
            pixels_per_point: window.scale_factor() as f32,
        };

        self.egui_renderer
            .update_buffers(device, queue, encoder, &tris, &screen_descriptor);

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            let mut render_pass = render_pass.forget_lifetime();

            self.egui_renderer
                .render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

fn speed_slider(ui: &mut egui::Ui, scalar: &mut SpeedScalar, label: &str) {
    let mut value = scalar.get();
    let response = ui.add(
        egui::Slider::new(&mut value, SpeedScalar::MIN..=SpeedScalar::MAX)
            .step_by(SpeedScalar::STEP as f64)
            .text(label),
    );
    if response.changed() {
        scalar.set(value);
    }
}
