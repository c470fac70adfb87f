//! Shadow map of the directional key light.
//!
//! Every frame starts with a depth-only pass rendering the shadow casters from
//! the light's orthographic camera into [`ShadowMap`]. The lit and procedural
//! shaders then compare against it with a 3x3 percentage-closer filter for
//! instances flagged as shadow receivers.

use cgmath::{Matrix4, Point3, Vector3};
use wgpu::util::DeviceExt;

use crate::{
    camera::OPENGL_TO_WGPU_MATRIX,
    data_structures::{
        instance::InstanceRaw,
        model::{ModelVertex, SkinVertex, Vertex},
        texture::Texture,
    },
    pipelines::{basic::uniform_entry, light::DIRECTIONAL_POSITION},
};

/// Edge length of the square shadow map in texels.
pub const SHADOW_MAP_SIZE: u32 = 512;

/// The orthographic frustum the key light renders its shadow map through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCamera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowCamera {
    fn default() -> Self {
        Self {
            position: DIRECTIONAL_POSITION.into(),
            target: Point3::new(0.0, 0.0, 0.0),
            left: -50.0,
            right: 50.0,
            bottom: -40.0,
            top: 30.0,
            near: 1.0,
            far: 100.0,
        }
    }
}

impl ShadowCamera {
    pub fn view_proj(&self) -> Matrix4<f32> {
        let view = Matrix4::look_at_rh(self.position, self.target, Vector3::unit_y());
        let proj = cgmath::ortho(self.left, self.right, self.bottom, self.top, self.near, self.far);
        OPENGL_TO_WGPU_MATRIX * proj * view
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowUniform {
    pub view_proj: [[f32; 4]; 4],
}

/// The depth target of the shadow pass and the bindings both passes use.
#[derive(Debug)]
pub struct ShadowMap {
    pub texture: Texture,
    pub sampler: wgpu::Sampler,
    pub buffer: wgpu::Buffer,
    /// Group 0 of the shadow pipelines.
    pub bind_group: wgpu::BindGroup,
}

impl ShadowMap {
    pub fn new(device: &wgpu::Device, pass_layout: &wgpu::BindGroupLayout, camera: &ShadowCamera) -> Self {
        let texture = Texture::create_depth_texture(device, [SHADOW_MAP_SIZE; 2], "shadow_map");
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Shadow Pass Buffer"),
            contents: bytemuck::cast_slice(&[ShadowUniform {
                view_proj: camera.view_proj().into(),
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: pass_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("shadow_pass_bind_group"),
        });
        Self {
            texture,
            sampler,
            buffer,
            bind_group,
        }
    }
}

/// The light's view-projection, read by the shadow vertex shaders.
pub fn shadow_pass_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform_entry(0)],
        label: Some("shadow_pass_layout"),
    })
}

fn shader() -> wgpu::ShaderModuleDescriptor<'static> {
    wgpu::ShaderModuleDescriptor {
        label: Some("Shadow Shader"),
        source: wgpu::ShaderSource::Wgsl(
            concat!(
                include_str!("common.wgsl"),
                include_str!("skin.wgsl"),
                include_str!("shadow.wgsl")
            )
            .into(),
        ),
    }
}

/// Depth-only pipeline for the casters. Passing `joints_layout` builds the
/// skinned variant.
pub fn mk_shadow_pipeline(
    device: &wgpu::Device,
    pass_layout: &wgpu::BindGroupLayout,
    joints_layout: Option<&wgpu::BindGroupLayout>,
) -> wgpu::RenderPipeline {
    let (label, layouts, entry_point): (_, Vec<&wgpu::BindGroupLayout>, _) = match joints_layout {
        Some(joints) => ("Skinned Shadow Pipeline", vec![pass_layout, joints], "vs_skinned"),
        None => ("Shadow Pipeline", vec![pass_layout], "vs_main"),
    };
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &layouts,
        immediate_size: 0,
    });
    let buffers = [ModelVertex::desc(), InstanceRaw::desc(), SkinVertex::desc()];
    let buffers = if joints_layout.is_some() {
        &buffers[..]
    } else {
        &buffers[..2]
    };
    let shader = device.create_shader_module(shader());

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some(entry_point),
            buffers,
            compilation_options: Default::default(),
        },
        fragment: None,
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // open models would leak light through their back faces
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState {
                constant: 2,
                slope_scale: 2.0,
                clamp: 0.0,
            },
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector4;

    fn project(point: [f32; 3]) -> Vector4<f32> {
        let clip = ShadowCamera::default().view_proj() * Vector4::new(point[0], point[1], point[2], 1.0);
        clip / clip.w
    }

    #[test]
    fn the_origin_lies_inside_the_light_frustum() {
        let ndc = project([0.0, 0.0, 0.0]);
        // the frustum is centred horizontally but not vertically
        assert!(ndc.x.abs() < 1e-5);
        assert!((ndc.y - 10.0 / 70.0).abs() < 1e-5);
        let distance = (15.0f32 * 15.0 + 20.0 * 20.0 + 70.0 * 70.0).sqrt();
        let gl_depth = (2.0 * distance - 101.0) / 99.0;
        assert!((ndc.z - (gl_depth * 0.5 + 0.5)).abs() < 1e-4);
    }

    #[test]
    fn points_beyond_the_far_plane_fall_outside() {
        // twice as far from the light as the origin, past the 100 unit far plane
        let ndc = project([-15.0, -20.0, 70.0]);
        assert!(ndc.z > 1.0);
    }
}
