//! GPU-side meshes and materials.
//!
//! A [`Mesh`] owns the vertex and index buffers of one decoded primitive. A
//! [`Material`] owns the bind group a pipeline needs to shade it. Meshes and
//! materials are uploaded lazily by the renderer the first time a scene node
//! references them.

use std::ops::Range;

/// Describes how a vertex type is laid out in a vertex buffer.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 11]>() as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Joint indices and weights of a skinned vertex, kept in a buffer of their
/// own next to the [`ModelVertex`] buffer. Weights sum to one.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkinVertex {
    pub joints: [u32; 4],
    pub weights: [f32; 4],
}

impl SkinVertex {
    /// Normalizes the weights; a vertex without any weight follows joint 0.
    pub fn new(joints: [u16; 4], weights: [f32; 4]) -> Self {
        let sum: f32 = weights.iter().sum();
        let weights = if sum > f32::EPSILON {
            weights.map(|w| w / sum)
        } else {
            [1.0, 0.0, 0.0, 0.0]
        };
        let joints = if sum > f32::EPSILON { joints } else { [0; 4] };
        Self {
            joints: joints.map(u32::from),
            weights,
        }
    }
}

impl Vertex for SkinVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<SkinVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 14,
                    format: wgpu::VertexFormat::Uint32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[u32; 4]>() as wgpu::BufferAddress,
                    shader_location: 15,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// A coloured point of the star field. Points are stepped per instance and
/// expanded to a camera-facing quad in the vertex shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl Vertex for PointVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<PointVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    /// [`SkinVertex`] data of a skinned mesh.
    pub skin_buffer: Option<wgpu::Buffer>,
    pub num_elements: u32,
}

/// Sprites of a point cloud, drawn without an index buffer.
#[derive(Debug)]
pub struct Points {
    pub vertex_buffer: wgpu::Buffer,
    pub num_points: u32,
}

impl Points {
    pub fn upload(device: &wgpu::Device, label: &str, points: &[PointVertex]) -> Self {
        use wgpu::util::DeviceExt;
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(points),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            vertex_buffer,
            num_points: points.len() as u32,
        }
    }
}

/// A shaded surface: the bind group plus the uniform buffer feeding it.
///
/// `revision` mirrors the revision of the CPU-side material description it was
/// built from so the renderer can rebuild it when a texture arrives late.
#[derive(Debug)]
pub struct Material {
    pub name: String,
    pub bind_group: wgpu::BindGroup,
    pub uniform: wgpu::Buffer,
    pub revision: u64,
}

pub trait DrawModel {
    fn draw_mesh_instanced(
        &mut self,
        mesh: &Mesh,
        material: &Material,
        instances: Range<u32>,
        camera_bind_group: &wgpu::BindGroup,
        light_bind_group: &wgpu::BindGroup,
    );

    /// Draws only the geometry, for passes that bind everything else up front.
    fn draw_mesh_depth(&mut self, mesh: &Mesh, instances: Range<u32>);

    fn draw_points(&mut self, points: &Points, material: &Material, camera_bind_group: &wgpu::BindGroup);
}

impl DrawModel for wgpu::RenderPass<'_> {
    fn draw_mesh_instanced(
        &mut self,
        mesh: &Mesh,
        material: &Material,
        instances: Range<u32>,
        camera_bind_group: &wgpu::BindGroup,
        light_bind_group: &wgpu::BindGroup,
    ) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, &material.bind_group, &[]);
        self.set_bind_group(1, camera_bind_group, &[]);
        self.set_bind_group(2, light_bind_group, &[]);
        self.draw_indexed(0..mesh.num_elements, 0, instances);
    }

    fn draw_mesh_depth(&mut self, mesh: &Mesh, instances: Range<u32>) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.draw_indexed(0..mesh.num_elements, 0, instances);
    }

    fn draw_points(&mut self, points: &Points, material: &Material, camera_bind_group: &wgpu::BindGroup) {
        self.set_vertex_buffer(0, points.vertex_buffer.slice(..));
        self.set_bind_group(0, &material.bind_group, &[]);
        self.set_bind_group(1, camera_bind_group, &[]);
        // two triangles per sprite
        self.draw(0..6, 0..points.num_points);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skin_weights_are_normalized() {
        let skin = SkinVertex::new([3, 1, 0, 0], [2.0, 2.0, 0.0, 0.0]);
        assert_eq!(skin.joints, [3, 1, 0, 0]);
        assert_eq!(skin.weights, [0.5, 0.5, 0.0, 0.0]);

        let unweighted = SkinVertex::new([7, 0, 0, 0], [0.0; 4]);
        assert_eq!(unweighted.joints, [0; 4]);
        assert_eq!(unweighted.weights, [1.0, 0.0, 0.0, 0.0]);
    }
}
