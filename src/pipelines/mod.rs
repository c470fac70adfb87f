//! Render pipelines and the material bind group layouts they consume.
//!
//! Every pipeline is created once by the [`Context`](crate::context::Context)
//! and shared by all draws of its kind.

pub mod basic;
pub mod light;
pub mod points;
pub mod procedural;
pub mod shadow;
pub mod sky;
pub mod transparent;

#[derive(Debug)]
pub struct Layouts {
    /// Textured, lit surfaces.
    pub standard: wgpu::BindGroupLayout,
    /// Glass and procedural surfaces: a single uniform buffer.
    pub uniform: wgpu::BindGroupLayout,
    pub points: wgpu::BindGroupLayout,
    pub sky: wgpu::BindGroupLayout,
    /// Joint palette of a skinned mesh.
    pub joints: wgpu::BindGroupLayout,
    /// The light's view-projection during the shadow pass.
    pub shadow_pass: wgpu::BindGroupLayout,
}

impl Layouts {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            standard: basic::standard_layout(device),
            uniform: basic::uniform_layout(device),
            points: points::points_layout(device),
            sky: sky::sky_layout(device),
            joints: basic::joints_layout(device),
            shadow_pass: shadow::shadow_pass_layout(device),
        }
    }
}

#[derive(Debug)]
pub struct Pipelines {
    pub lit: wgpu::RenderPipeline,
    pub skinned: wgpu::RenderPipeline,
    pub glass: wgpu::RenderPipeline,
    pub procedural: wgpu::RenderPipeline,
    pub overlay: wgpu::RenderPipeline,
    pub points: wgpu::RenderPipeline,
    pub sky: wgpu::RenderPipeline,
    pub shadow: wgpu::RenderPipeline,
    pub skinned_shadow: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        layouts: &Layouts,
        camera_layout: &wgpu::BindGroupLayout,
        light_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        Self {
            lit: basic::mk_basic_pipeline(device, config, &layouts.standard, camera_layout, light_layout),
            skinned: basic::mk_skinned_pipeline(
                device,
                config,
                &layouts.standard,
                camera_layout,
                light_layout,
                &layouts.joints,
            ),
            glass: transparent::mk_transparent_pipeline(
                device,
                config,
                &layouts.uniform,
                camera_layout,
                light_layout,
            ),
            procedural: procedural::mk_procedural_pipeline(
                device,
                config,
                &layouts.uniform,
                camera_layout,
                light_layout,
            ),
            overlay: procedural::mk_overlay_pipeline(
                device,
                config,
                &layouts.uniform,
                camera_layout,
                light_layout,
            ),
            points: points::mk_points_pipeline(device, config, &layouts.points, camera_layout),
            sky: sky::mk_sky_pipeline(device, config, &layouts.sky, camera_layout),
            shadow: shadow::mk_shadow_pipeline(device, &layouts.shadow_pass, None),
            skinned_shadow: shadow::mk_shadow_pipeline(device, &layouts.shadow_pass, Some(&layouts.joints)),
        }
    }
}
