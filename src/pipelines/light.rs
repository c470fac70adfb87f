use wgpu::util::DeviceExt;

use crate::{
    data_structures::material::hex_rgb,
    pipelines::shadow::{ShadowCamera, ShadowMap},
};

/// Where the key light shines from; it points at the origin.
pub const DIRECTIONAL_POSITION: [f32; 3] = [15.0, 20.0, -70.0];

/// The scene's three lights: a hemisphere fill, a directional key light and a
/// point light with a linear falloff range.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    /// rgb + intensity
    pub sky_color: [f32; 4],
    pub ground_color: [f32; 4],
    /// Position the directional light shines from; w unused.
    pub directional_position: [f32; 4],
    pub directional_color: [f32; 4],
    /// xyz + range
    pub point_position: [f32; 4],
    /// rgb + intensity
    pub point_color: [f32; 4],
    /// Maps world positions into the key light's shadow map.
    pub shadow_view_proj: [[f32; 4]; 4],
}

impl Default for LightUniform {
    fn default() -> Self {
        let rgb = |hex, w| {
            let [r, g, b] = hex_rgb(hex);
            [r, g, b, w]
        };
        let [x, y, z] = DIRECTIONAL_POSITION;
        Self {
            sky_color: rgb(0xffeeff, 0.6),
            ground_color: rgb(0x4810b0, 0.6),
            directional_position: [x, y, z, 0.0],
            directional_color: rgb(0xffdeaa, 1.0),
            point_position: [-15.0, 5.0, 0.0, 50.0],
            point_color: rgb(0xffeebb, 1.0),
            shadow_view_proj: ShadowCamera::default().view_proj().into(),
        }
    }
}

#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub shadow: ShadowMap,
}

impl LightResources {
    pub fn new(uniform: LightUniform, device: &wgpu::Device, shadow_pass_layout: &wgpu::BindGroupLayout) -> Self {
        let buffer = mk_buffer(device, uniform);
        let shadow = ShadowMap::new(device, shadow_pass_layout, &ShadowCamera::default());
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer, &shadow);
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
            shadow,
        }
    }

    pub fn write(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Depth,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
    shadow: &ShadowMap,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&shadow.texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&shadow.sampler),
            },
        ],
        label: Some("light_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<LightUniform>() % 16, 0);
        let lights = LightUniform::default();
        assert_eq!(lights.point_position[3], 50.0);
    }

    #[test]
    fn shadows_are_cast_from_the_key_light() {
        let lights = LightUniform::default();
        let [x, y, z] = DIRECTIONAL_POSITION;
        assert_eq!(lights.directional_position, [x, y, z, 0.0]);
        let expected: [[f32; 4]; 4] = ShadowCamera::default().view_proj().into();
        assert_eq!(lights.shadow_view_proj, expected);
    }
}
