use crate::{
    data_structures::{
        material::PointsMaterial,
        model::{PointVertex, Vertex},
    },
    pipelines::{
        basic::{DepthMode, mk_render_pipeline, sampler_entry, uniform_entry},
        procedural::additive,
    },
};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointsUniform {
    pub model: [[f32; 4]; 4],
    /// size, alpha test
    pub params: [f32; 4],
}

impl PointsUniform {
    pub fn new(material: &PointsMaterial, model: cgmath::Matrix4<f32>) -> Self {
        Self {
            model: model.into(),
            params: [material.size, material.alpha_test, 0.0, 0.0],
        }
    }
}

/// Uniform, sprite, sampler.
pub fn points_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            uniform_entry(0),
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            sampler_entry(2),
        ],
        label: Some("points_material_layout"),
    })
}

/// Camera-facing sprites, added onto whatever is behind them. They are depth
/// tested against the scene but never occlude each other.
pub fn mk_points_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    material_layout: &wgpu::BindGroupLayout,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Points Pipeline Layout"),
        bind_group_layouts: &[material_layout, camera_bind_group_layout],
        immediate_size: 0,
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Points Shader"),
        source: wgpu::ShaderSource::Wgsl(
            concat!(include_str!("common.wgsl"), include_str!("points.wgsl")).into(),
        ),
    };
    mk_render_pipeline(
        device,
        &layout,
        config.format,
        Some(additive()),
        DepthMode::READ_ONLY,
        None,
        &[PointVertex::desc()],
        shader,
    )
}
