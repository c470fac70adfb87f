use crate::{
    data_structures::{
        instance::InstanceRaw,
        material::GlassMaterial,
        model::{ModelVertex, Vertex},
    },
    pipelines::basic::{DepthMode, mk_render_pipeline},
};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlassUniform {
    /// rgb + opacity
    pub tint: [f32; 4],
    /// rgb + shininess
    pub specular: [f32; 4],
}

impl From<&GlassMaterial> for GlassUniform {
    fn from(m: &GlassMaterial) -> Self {
        let [r, g, b] = m.tint;
        let [sr, sg, sb] = m.specular;
        Self {
            tint: [r, g, b, m.opacity],
            specular: [sr, sg, sb, m.shininess],
        }
    }
}

/**
 * Pipeline for the glass dome.
 *
 * Both faces are drawn so the far side of the sphere shows through the near
 * one. The glass never writes depth: everything inside stays visible and is
 * only tinted by the blend.
 */
pub fn mk_transparent_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    material_layout: &wgpu::BindGroupLayout,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
    light_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Glass Pipeline Layout"),
        bind_group_layouts: &[
            material_layout,
            camera_bind_group_layout,
            light_bind_group_layout,
        ],
        immediate_size: 0,
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Glass Shader"),
        source: wgpu::ShaderSource::Wgsl(
            concat!(include_str!("common.wgsl"), include_str!("glass.wgsl")).into(),
        ),
    };
    mk_render_pipeline(
        device,
        &render_pipeline_layout,
        config.format,
        Some(wgpu::BlendState::ALPHA_BLENDING),
        DepthMode::READ_ONLY,
        None,
        &[ModelVertex::desc(), InstanceRaw::desc()],
        shader,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opacity_rides_in_the_tint_alpha() {
        let uniform = GlassUniform::from(&GlassMaterial::default());
        assert_eq!(uniform.tint[3], 0.08);
        assert_eq!(uniform.specular[3], 128.0);
    }
}
