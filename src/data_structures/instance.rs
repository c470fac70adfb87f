//! Node transforms and their GPU representation.
//!
//! An [`Instance`] is the local or world transform of a scene node. World
//! transforms are produced by composing the parent's world transform with the
//! node's local transform (`parent * local`). Each drawn node contributes one
//! [`InstanceRaw`] to the instance buffer of its draw batch.

use std::ops::Mul;

use cgmath::{One, Rotation3, SquareMatrix};

use crate::data_structures::model;

/// Position, rotation (as quaternion) and scale of a scene node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Identity transform (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Builds a transform from a position, a rotation around the y axis (radians)
    /// and a uniform scale. This is the shape of every authored placement.
    pub fn placed(position: [f32; 3], yaw: f32, scale: f32) -> Self {
        Self {
            position: position.into(),
            rotation: cgmath::Quaternion::from_angle_y(cgmath::Rad(yaw)),
            scale: cgmath::Vector3::new(scale, scale, scale),
        }
    }

    pub fn with_position(mut self, position: [f32; 3]) -> Self {
        self.position = position.into();
        self
    }

    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.rotation = cgmath::Quaternion::from_angle_y(cgmath::Rad(yaw));
        self
    }

    pub fn with_scale(mut self, scale: [f32; 3]) -> Self {
        self.scale = scale.into();
        self
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn to_raw(&self) -> InstanceRaw {
        let world_matrix = self.to_matrix();
        let handedness = world_matrix.determinant().signum();
        InstanceRaw {
            model: world_matrix.into(),
            normal: cgmath::Matrix3::from(self.rotation).into(),
            handedness,
            receive_shadow: 0.0,
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, 'b> Mul<&'b Instance> for &'a Instance {
    type Output = Instance;

    /// Applies `rhs` in the space of `self`. Scale is composed per axis, which is
    /// exact as long as rotated children are not scaled non-uniformly.
    fn mul(self, rhs: &'b Instance) -> Self::Output {
        let scale = cgmath::Vector3::new(
            self.scale.x * rhs.scale.x,
            self.scale.y * rhs.scale.y,
            self.scale.z * rhs.scale.z,
        );
        let scaled_rhs_pos = cgmath::Vector3::new(
            self.scale.x * rhs.position.x,
            self.scale.y * rhs.position.y,
            self.scale.z * rhs.position.z,
        );
        Instance {
            position: self.position + (self.rotation * scaled_rhs_pos),
            rotation: self.rotation * rhs.rotation,
            scale,
        }
    }
}

impl Mul<Instance> for Instance {
    type Output = Instance;

    fn mul(self, rhs: Instance) -> Self::Output {
        &self * &rhs
    }
}

impl From<cgmath::Vector3<f32>> for Instance {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Instance {
            position,
            ..Default::default()
        }
    }
}

/**
 * The raw instance is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
    handedness: f32,
    receive_shadow: f32,
}

impl InstanceRaw {
    /// Marks the instance as darkened where the key light's shadow map is
    /// occluded.
    pub fn receiving_shadows(mut self, receive: bool) -> Self {
        self.receive_shadow = if receive { 1.0 } else { 0.0 };
        self
    }

    pub fn receives_shadows(&self) -> bool {
        self.receive_shadow > 0.5
    }
}

/**
 * Stride layout: the model matrix as four vec4s, the normal matrix as three vec3s,
 * the handedness of the transform (negative for mirrored nodes) and the
 * shadow-receiving flag.
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 25]>() as wgpu::BufferAddress,
                    shader_location: 12,
                    format: wgpu::VertexFormat::Float32,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 26]>() as wgpu::BufferAddress,
                    shader_location: 13,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector3};

    #[test]
    fn composing_applies_parent_scale_and_rotation_to_child_offset() {
        let parent = Instance::placed([1.0, 0.0, 0.0], std::f32::consts::FRAC_PI_2, 2.0);
        let child = Instance::new().with_position([1.0, 0.0, 0.0]);
        let world = &parent * &child;
        // A quarter turn around y maps +x to -z.
        assert!((world.position - Vector3::new(1.0, 0.0, -2.0)).magnitude() < 1e-5);
        assert_eq!(world.scale, Vector3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn shadow_flag_defaults_off() {
        let raw = Instance::new().to_raw();
        assert!(!raw.receives_shadows());
        assert!(raw.receiving_shadows(true).receives_shadows());
        assert_eq!(std::mem::size_of::<InstanceRaw>(), 27 * 4);
    }

    #[test]
    fn identity_is_neutral() {
        let t = Instance::placed([-8.0, 5.5, 9.0], 0.3, 0.67);
        assert_eq!(&Instance::new() * &t, t);
    }
}
