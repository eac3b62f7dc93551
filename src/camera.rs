//! Camera types, orbit controller and uniforms for view/projection.
//!
//! The camera orbits a fixed look-at target: pointer drags change
//! azimuth/polar angles, the scroll wheel zooms, and every frame the
//! controller applies inertial damping and recomputes the camera position.
//! `update()` is called once per frame unconditionally and settles to a
//! no-op when no input is pending.

use instant::Duration;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use cgmath::{
    Angle, EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3, perspective,
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Debug)]
pub struct Camera {
    pub position: Point3<f32>,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, Y: Into<Rad<f32>>, R: Into<Rad<f32>>>(
        position: P,
        yaw: Y,
        pitch: R,
    ) -> Self {
        Self {
            position: position.into(),
            yaw: yaw.into(),
            pitch: pitch.into(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();

        Matrix4::look_to_rh(
            self.position,
            Vector3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw).normalize(),
            Vector3::unit_y(),
        )
    }
}

#[derive(Debug)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height as f32;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Orbits the camera around a fixed look-at target.
///
/// Pointer drags accumulate angular velocity, the wheel accumulates zoom
/// velocity; both decay exponentially so the camera glides to rest.
#[derive(Debug)]
pub struct OrbitController {
    pub target: Point3<f32>,
    radius: f32,
    azimuth: Rad<f32>,
    polar: Rad<f32>,
    rot_velocity: cgmath::Vector2<f32>,
    zoom_velocity: f32,
    rotate_speed: f32,
    zoom_speed: f32,
    damping: f32,
    dragging: bool,
}

impl OrbitController {
    const MIN_RADIUS: f32 = 1.0;
    const MAX_RADIUS: f32 = 400.0;

    /// Build a controller that keeps `camera`'s current distance and angles
    /// relative to `target`.
    pub fn new<P: Into<Point3<f32>>>(camera: &Camera, target: P) -> Self {
        let target = target.into();
        let offset = camera.position - target;
        let radius = offset.magnitude().max(Self::MIN_RADIUS);
        let azimuth = Rad(offset.z.atan2(offset.x));
        let polar = Rad((offset.y / radius).clamp(-1.0, 1.0).acos());
        Self {
            target,
            radius,
            azimuth,
            polar,
            rot_velocity: cgmath::Vector2::new(0.0, 0.0),
            zoom_velocity: 0.0,
            rotate_speed: 0.005,
            zoom_speed: 0.1,
            damping: 0.001,
            dragging: false,
        }
    }

    /// Feed a raw pointer delta. Ignored unless the primary button is held.
    pub fn handle_mouse(&mut self, dx: f64, dy: f64) {
        if !self.dragging {
            return;
        }
        self.rot_velocity.x += dx as f32 * self.rotate_speed;
        self.rot_velocity.y += dy as f32 * self.rotate_speed;
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = *state == ElementState::Pressed;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let amount = match delta {
                    MouseScrollDelta::LineDelta(_, rows) => *rows,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                self.zoom_velocity -= amount * self.zoom_speed;
            }
            _ => (),
        }
    }

    /// Apply pending velocities, damp them and place `camera` on its orbit.
    ///
    /// Must be called once per frame; with no pending input the velocities
    /// are zero and the camera stays put.
    pub fn update(&mut self, camera: &mut Camera, dt: Duration) {
        let dt = dt.as_secs_f32();

        self.azimuth += Rad(self.rot_velocity.x);
        self.polar = Rad((self.polar.0 + self.rot_velocity.y).clamp(0.01, std::f32::consts::PI - 0.01));
        self.radius = (self.radius * (1.0 + self.zoom_velocity)).clamp(Self::MIN_RADIUS, Self::MAX_RADIUS);

        // exponential decay towards rest, frame-rate independent
        let decay = self.damping.powf(dt);
        self.rot_velocity *= decay;
        self.zoom_velocity *= decay;

        let (sin_polar, cos_polar) = self.polar.sin_cos();
        let (sin_azimuth, cos_azimuth) = self.azimuth.sin_cos();
        let offset = Vector3::new(
            self.radius * sin_polar * cos_azimuth,
            self.radius * cos_polar,
            self.radius * sin_polar * sin_azimuth,
        );
        camera.position = self.target + offset;

        let dir = (self.target - camera.position).normalize();
        camera.yaw = Rad(dir.z.atan2(dir.x));
        camera.pitch = Rad(dir.y.clamp(-1.0, 1.0).asin());
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
    inv_view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
            inv_view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        let view_proj = projection.calc_matrix() * camera.calc_matrix();
        self.view_proj = view_proj.into();
        // the sky pass reconstructs view rays from clip space
        self.inv_view_proj = view_proj
            .invert()
            .unwrap_or_else(Matrix4::identity)
            .into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything camera related the render passes need: the camera itself, its
/// controller, and the GPU-side uniform.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Deg;

    #[test]
    fn update_without_input_is_idempotent() {
        let mut camera = Camera::new((-5.0, 6.0, 40.0), Deg(-90.0), Deg(0.0));
        let mut controller = OrbitController::new(&camera, (-3.0, 10.0, 0.0));
        controller.update(&mut camera, Duration::from_millis(16));
        let settled = camera.position;
        for _ in 0..10 {
            controller.update(&mut camera, Duration::from_millis(16));
        }
        let diff = camera.position - settled;
        assert!(diff.magnitude() < 1e-4);
    }

    #[test]
    fn orbit_preserves_distance_to_target() {
        let mut camera = Camera::new((-5.0, 6.0, 40.0), Deg(-90.0), Deg(0.0));
        let target = Point3::new(-3.0, 10.0, 0.0);
        let mut controller = OrbitController::new(&camera, target);
        let before = (camera.position - target).magnitude();

        controller.handle_window_events(&WindowEvent::MouseInput {
            device_id: winit::event::DeviceId::dummy(),
            state: ElementState::Pressed,
            button: MouseButton::Left,
        });
        controller.handle_mouse(25.0, -10.0);
        for _ in 0..5 {
            controller.update(&mut camera, Duration::from_millis(16));
        }
        let after = (camera.position - target).magnitude();
        assert!((before - after).abs() < 1e-3);
    }

    #[test]
    fn drag_is_ignored_while_button_is_released() {
        let mut camera = Camera::new((0.0, 0.0, 10.0), Deg(-90.0), Deg(0.0));
        let mut controller = OrbitController::new(&camera, (0.0, 0.0, 0.0));
        controller.update(&mut camera, Duration::from_millis(16));
        let resting = camera.position;
        controller.handle_mouse(100.0, 100.0);
        controller.update(&mut camera, Duration::from_millis(16));
        let diff = camera.position - resting;
        assert!(diff.magnitude() < 1e-4);
    }
}
