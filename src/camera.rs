//! Orbit camera, its controller and the uniform the shaders read.
//!
//! The camera circles a target point. Dragging with a mouse button held turns it
//! around the target and the wheel moves it closer or further away, within
//! `[min_distance, max_distance]`. Immersive mode parks the camera at a fixed
//! eye pose and disables the controller until it is left again.

use std::f32::consts::FRAC_PI_2;

use cgmath::{InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3, perspective};
use instant::Duration;
use winit::{
    dpi::PhysicalPosition,
    event::{MouseScrollDelta, WindowEvent},
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const SAFE_FRAC_PI_2: f32 = FRAC_PI_2 - 0.0001;

/// Eye height of the viewer in immersive mode.
pub const IMMERSIVE_EYE: [f32; 3] = [0.0, 1.6, 0.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub target: Point3<f32>,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
    pub distance: f32,
}

impl Camera {
    /// A camera at `eye` looking at `target`.
    pub fn looking_at<E: Into<Point3<f32>>, T: Into<Point3<f32>>>(eye: E, target: T) -> Self {
        let eye = eye.into();
        let target = target.into();
        let offset = eye - target;
        let distance = offset.magnitude();
        let horizontal = (offset.x * offset.x + offset.z * offset.z).sqrt();
        Self {
            target,
            yaw: Rad(offset.x.atan2(offset.z)),
            pitch: Rad(offset.y.atan2(horizontal)),
            distance,
        }
    }

    pub fn eye(&self) -> Point3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        self.target
            + Vector3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw) * self.distance
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye(), self.target, Vector3::unit_y())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[derive(Debug)]
pub struct CameraController {
    rotate_horizontal: f32,
    rotate_vertical: f32,
    scroll: f32,
    sensitivity: f32,
    zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub enabled: bool,
}

impl CameraController {
    pub fn new(sensitivity: f32, zoom_speed: f32, max_distance: f32) -> Self {
        Self {
            rotate_horizontal: 0.0,
            rotate_vertical: 0.0,
            scroll: 0.0,
            sensitivity,
            zoom_speed,
            min_distance: 1.0,
            max_distance,
            enabled: true,
        }
    }

    pub fn handle_mouse(&mut self, mouse_dx: f64, mouse_dy: f64) {
        self.rotate_horizontal += mouse_dx as f32;
        self.rotate_vertical += mouse_dy as f32;
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        if let WindowEvent::MouseWheel { delta, .. } = event {
            self.scroll += match delta {
                MouseScrollDelta::LineDelta(_, scroll) => *scroll,
                MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => *y as f32 / 50.0,
            };
        }
    }

    pub fn update(&mut self, camera: &mut Camera, dt: Duration) {
        let dt = dt.as_secs_f32();
        if self.enabled {
            camera.yaw -= Rad(self.rotate_horizontal * self.sensitivity * dt);
            camera.pitch += Rad(self.rotate_vertical * self.sensitivity * dt);
            camera.pitch = Rad(camera.pitch.0.clamp(-SAFE_FRAC_PI_2, SAFE_FRAC_PI_2));
            // wheel up moves closer
            camera.distance *= 1.0 - self.scroll * self.zoom_speed;
            camera.distance = camera.distance.clamp(self.min_distance, self.max_distance);
        }
        self.rotate_horizontal = 0.0;
        self.rotate_vertical = 0.0;
        self.scroll = 0.0;
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    /// Maps clip space back to world space; the sky uses it to find view rays.
    pub inv_view_proj: [[f32; 4]; 4],
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraUniform {
    pub fn new() -> Self {
        let identity = Matrix4::identity().into();
        Self {
            view_position: [0.0; 4],
            view: identity,
            proj: identity,
            view_proj: identity,
            inv_view_proj: identity,
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.eye().to_homogeneous().into();
        let view = camera.calc_matrix();
        let proj = projection.calc_matrix();
        let view_proj = proj * view;
        self.view = view.into();
        self.proj = proj.into();
        self.view_proj = view_proj.into();
        self.inv_view_proj = view_proj
            .invert()
            .unwrap_or_else(Matrix4::identity)
            .into();
    }
}

#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: CameraController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    /// The orbit camera to restore when immersive mode ends.
    saved: Option<Camera>,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device, camera: Camera, controller: CameraController, projection: &Projection) -> Self {
        use wgpu::util::DeviceExt;

        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, projection);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            camera,
            controller,
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
            saved: None,
        }
    }

    pub fn is_immersive(&self) -> bool {
        self.saved.is_some()
    }

    /// Parks the camera at the viewer's eye, looking down -z.
    pub fn enter_immersive(&mut self) {
        if self.saved.is_none() {
            self.saved = Some(self.camera);
        }
        let [x, y, z] = IMMERSIVE_EYE;
        self.camera = Camera::looking_at(Point3::new(x, y, z), Point3::new(x, y, z - 1.0));
        self.controller.enabled = false;
    }

    pub fn exit_immersive(&mut self) {
        if let Some(camera) = self.saved.take() {
            self.camera = camera;
        }
        self.controller.enabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::EuclideanSpace;

    #[test]
    fn looking_at_round_trips_the_eye() {
        let camera = Camera::looking_at(Point3::new(100.0, 100.0, 120.0), Point3::origin());
        let eye = camera.eye();
        assert!((eye - Point3::new(100.0, 100.0, 120.0)).magnitude() < 1e-3);
    }

    #[test]
    fn zoom_is_clamped_to_the_max_distance() {
        let mut camera = Camera::looking_at(Point3::new(0.0, 0.0, 400.0), Point3::origin());
        let mut controller = CameraController::new(0.4, 0.1, 450.0);
        controller.scroll = -20.0;
        controller.update(&mut camera, Duration::from_millis(16));
        assert_eq!(camera.distance, 450.0);
    }

    #[test]
    fn disabled_controller_drops_input() {
        let mut camera = Camera::looking_at(Point3::new(0.0, 0.0, 10.0), Point3::origin());
        let before = camera;
        let mut controller = CameraController::new(0.4, 0.1, 450.0);
        controller.enabled = false;
        controller.handle_mouse(30.0, 10.0);
        controller.update(&mut camera, Duration::from_millis(16));
        assert_eq!(camera, before);
        controller.enabled = true;
        controller.update(&mut camera, Duration::from_millis(16));
        assert_eq!(camera, before);
    }
}
