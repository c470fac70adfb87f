//! Shader-generated surfaces: wood, the electric glow and the lost-signal
//! billboard. They share one shader that switches on the material kind; the
//! glow runs through its own pipeline so it can blend additively on top of the
//! scene.

use crate::{
    data_structures::{
        instance::InstanceRaw,
        material::ProceduralMaterial,
        model::{ModelVertex, Vertex},
    },
    pipelines::basic::{DepthMode, mk_render_pipeline},
};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ProceduralUniform {
    pub color_a: [f32; 4],
    pub color_b: [f32; 4],
    pub params: [f32; 4],
    /// x: elapsed seconds, y: kind code
    pub misc: [f32; 4],
}

impl ProceduralUniform {
    pub fn new(material: &ProceduralMaterial, time: f32) -> Self {
        let [ar, ag, ab] = material.color_a;
        let [br, bg, bb] = material.color_b;
        Self {
            color_a: [ar, ag, ab, 1.0],
            color_b: [br, bg, bb, 1.0],
            params: material.params,
            misc: [time, material.kind.code() as f32, 0.0, 0.0],
        }
    }
}

fn shader() -> wgpu::ShaderModuleDescriptor<'static> {
    wgpu::ShaderModuleDescriptor {
        label: Some("Procedural Shader"),
        source: wgpu::ShaderSource::Wgsl(
            concat!(
                include_str!("common.wgsl"),
                include_str!("shadows.wgsl"),
                include_str!("procedural.wgsl")
            )
            .into(),
        ),
    }
}

fn layout(
    device: &wgpu::Device,
    material_layout: &wgpu::BindGroupLayout,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
    light_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Procedural Pipeline Layout"),
        bind_group_layouts: &[
            material_layout,
            camera_bind_group_layout,
            light_bind_group_layout,
        ],
        immediate_size: 0,
    })
}

/// Opaque procedural surfaces.
pub fn mk_procedural_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    material_layout: &wgpu::BindGroupLayout,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
    light_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = layout(
        device,
        material_layout,
        camera_bind_group_layout,
        light_bind_group_layout,
    );
    mk_render_pipeline(
        device,
        &layout,
        config.format,
        Some(wgpu::BlendState::REPLACE),
        DepthMode::OPAQUE,
        Some(wgpu::Face::Back),
        &[ModelVertex::desc(), InstanceRaw::desc()],
        shader(),
    )
}

/// Additive surfaces that ignore the depth buffer and are drawn last.
pub fn mk_overlay_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    material_layout: &wgpu::BindGroupLayout,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
    light_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = layout(
        device,
        material_layout,
        camera_bind_group_layout,
        light_bind_group_layout,
    );
    mk_render_pipeline(
        device,
        &layout,
        config.format,
        Some(additive()),
        DepthMode::ALWAYS,
        None,
        &[ModelVertex::desc(), InstanceRaw::desc()],
        shader(),
    )
}

pub(crate) fn additive() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::Zero,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_time_share_the_misc_slot() {
        let uniform = ProceduralUniform::new(&ProceduralMaterial::lost_signal(), 2.5);
        assert_eq!(uniform.misc[0], 2.5);
        assert_eq!(uniform.misc[1], 2.0);
        assert_eq!(std::mem::size_of::<ProceduralUniform>(), 64);
    }
}
