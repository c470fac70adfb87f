use crate::{
    data_structures::texture::Texture,
    pipelines::basic::{DepthMode, mk_render_pipeline, sampler_entry},
};

/// Cube texture and its sampler.
pub fn sky_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::Cube,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            sampler_entry(1),
        ],
        label: Some("sky_layout"),
    })
}

/// Fails when the cubemap carries no sampler; [`Texture::cubemap`] always
/// creates one.
pub fn mk_sky_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    cubemap: &Texture,
) -> anyhow::Result<wgpu::BindGroup> {
    let sampler = cubemap
        .sampler
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("sky cubemap has no sampler"))?;
    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&cubemap.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some("sky_bind_group"),
    }))
}

/// A fullscreen triangle on the far plane. It only fills pixels nothing else
/// was drawn to, however it is ordered.
pub fn mk_sky_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    sky_layout: &wgpu::BindGroupLayout,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Sky Pipeline Layout"),
        bind_group_layouts: &[sky_layout, camera_bind_group_layout],
        immediate_size: 0,
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Sky Shader"),
        source: wgpu::ShaderSource::Wgsl(
            concat!(include_str!("common.wgsl"), include_str!("sky.wgsl")).into(),
        ),
    };
    mk_render_pipeline(
        device,
        &layout,
        config.format,
        Some(wgpu::BlendState::REPLACE),
        DepthMode::BACKGROUND,
        None,
        &[],
        shader,
    )
}
