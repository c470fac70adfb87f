//! GPU copies of the scene's meshes, textures and materials.
//!
//! Everything is uploaded lazily, the first frame a node references it, and a
//! material's bind group is rebuilt whenever its revision moves because a
//! texture arrived late. Nodes sharing a mesh, a material, a skin and a shadow
//! role are drawn with one instanced call. Joint palettes of skinned meshes are
//! rewritten every frame from the posed scene graph.

use std::collections::{BTreeMap, HashMap};

use wgpu::util::DeviceExt;

use crate::{
    context::Context,
    animation::MAX_JOINTS,
    data_structures::{
        instance::{Instance, InstanceRaw},
        material::{DrawPass, ImageId, MaterialDesc, MaterialId, Shading, TextureFilter},
        model::{Material, Mesh, Points},
        scene_graph::{Capabilities, MeshId, Node, SkinId},
        texture::{Texture, create_sampler},
    },
    pipelines::{
        basic::StandardUniform, points::PointsUniform, procedural::ProceduralUniform,
        sky::mk_sky_bind_group, transparent::GlassUniform,
    },
    render::{Instanced, PointCloud, Render},
};

use super::SceneContext;

/// What nodes must share to be drawn by one instanced call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchKey {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub skin: Option<SkinId>,
    pub casts_shadow: bool,
}

impl BatchKey {
    fn of(scene: &SceneContext, node: &Node) -> Option<Self> {
        let mesh = node.mesh?;
        let material = node.material?;
        Some(Self {
            mesh,
            material,
            skin: node.skin.filter(|_| can_skin(scene, mesh, material)),
            casts_shadow: node.capabilities.contains(Capabilities::CAST_SHADOW),
        })
    }
}

/// Only lit meshes carrying joint weights are drawn skinned; anything else
/// falls back to its node transform.
fn can_skin(scene: &SceneContext, mesh: MeshId, material: MaterialId) -> bool {
    let skinned = scene.assets.meshes.get(mesh.0).is_some_and(|data| data.is_skinned());
    let lit = scene
        .assets
        .material(material)
        .is_some_and(|desc| desc.pass() == DrawPass::Lit);
    skinned && lit
}

/// Groups this frame's drawable nodes into batches.
pub fn frame_batches(scene: &SceneContext) -> BTreeMap<BatchKey, Vec<InstanceRaw>> {
    let mut frame: BTreeMap<BatchKey, Vec<InstanceRaw>> = BTreeMap::new();
    for (_, node) in scene.graph.drawables() {
        let Some(key) = BatchKey::of(scene, node) else {
            continue;
        };
        // joints already carry the placement of a skinned mesh
        let world = if key.skin.is_some() {
            Instance::new()
        } else {
            node.world
        };
        let receive = node.capabilities.contains(Capabilities::RECEIVE_SHADOW);
        frame
            .entry(key)
            .or_default()
            .push(world.to_raw().receiving_shadows(receive));
    }
    frame
}

/// The joint palette buffer of one skin.
#[derive(Debug)]
struct Palette {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Instance transforms of every node drawing one mesh with one material.
#[derive(Debug)]
struct Batch {
    pass: DrawPass,
    buffer: wgpu::Buffer,
    capacity: usize,
    amount: usize,
}

#[derive(Debug, Default)]
pub struct GpuScene {
    meshes: HashMap<MeshId, Mesh>,
    textures: HashMap<(ImageId, bool), Texture>,
    materials: HashMap<MaterialId, Material>,
    batches: BTreeMap<BatchKey, Batch>,
    palettes: HashMap<SkinId, Palette>,
    stars: Option<Points>,
    sky: Option<wgpu::BindGroup>,
    sky_failed: bool,
}

impl GpuScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Brings the GPU side in line with the scene for this frame.
    pub fn sync(&mut self, ctx: &Context, scene: &SceneContext) {
        let frame = frame_batches(scene);

        for batch in self.batches.values_mut() {
            batch.amount = 0;
        }
        for (key, instances) in frame {
            let Some(desc) = scene.assets.material(key.material) else {
                continue;
            };
            if !self.ensure_mesh(ctx, scene, key.mesh) {
                continue;
            }
            self.ensure_material(ctx, scene, key.material, desc);
            if let Some(skin) = key.skin {
                self.write_palette(ctx, scene, skin);
            }
            self.write_batch(ctx, key, desc.pass(), &instances);
        }

        self.write_procedural_time(ctx, scene);
        self.sync_stars(ctx, scene);
        self.sync_sky(ctx, scene);
    }

    fn ensure_mesh(&mut self, ctx: &Context, scene: &SceneContext, id: MeshId) -> bool {
        if self.meshes.contains_key(&id) {
            return true;
        }
        match scene.assets.meshes.get(id.0) {
            Some(data) if data.is_valid() && !data.indices.is_empty() => {
                self.meshes.insert(id, data.upload(&ctx.device));
                true
            }
            Some(data) => {
                log::warn!("mesh {} has no drawable triangles", data.name);
                false
            }
            None => false,
        }
    }

    fn ensure_material(&mut self, ctx: &Context, scene: &SceneContext, id: MaterialId, desc: &MaterialDesc) {
        let stale = self
            .materials
            .get(&id)
            .is_none_or(|material| material.revision != desc.revision());
        if stale {
            let material = self.build_material(ctx, scene, desc);
            log::debug!("material {} uploaded at revision {}", desc.name, desc.revision());
            self.materials.insert(id, material);
        }
    }

    fn write_palette(&mut self, ctx: &Context, scene: &SceneContext, id: SkinId) {
        let Some(skin) = scene.assets.skin(id) else {
            return;
        };
        let palette = skin.palette_raw(&scene.graph);
        let contents: &[u8] = bytemuck::cast_slice(&palette);
        if let Some(existing) = self.palettes.get(&id) {
            ctx.queue.write_buffer(&existing.buffer, 0, contents);
            return;
        }
        let buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&skin.name),
            contents,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &ctx.layouts.joints,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some(&skin.name),
        });
        log::debug!("{}: palette of {} joints uploaded", skin.name, skin.joints.len().min(MAX_JOINTS));
        self.palettes.insert(id, Palette { buffer, bind_group });
    }

    fn write_batch(
        &mut self,
        ctx: &Context,
        key: BatchKey,
        pass: DrawPass,
        instances: &[InstanceRaw],
    ) {
        let contents: &[u8] = bytemuck::cast_slice(instances);
        match self.batches.get_mut(&key) {
            Some(batch) if batch.capacity >= instances.len() => {
                ctx.queue.write_buffer(&batch.buffer, 0, contents);
                batch.amount = instances.len();
                batch.pass = pass;
            }
            _ => {
                let buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Instance Buffer"),
                    contents,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                });
                self.batches.insert(
                    key,
                    Batch {
                        pass,
                        buffer,
                        capacity: instances.len(),
                        amount: instances.len(),
                    },
                );
            }
        }
    }

    fn texture(&mut self, ctx: &Context, scene: &SceneContext, id: ImageId, srgb: bool) -> Option<&Texture> {
        if !self.textures.contains_key(&(id, srgb)) {
            let image = scene.assets.image(id)?;
            let texture = Texture::from_image(&ctx.device, &ctx.queue, image, srgb, TextureFilter::Linear);
            self.textures.insert((id, srgb), texture);
        }
        self.textures.get(&(id, srgb))
    }

    fn texture_view(
        &mut self,
        ctx: &Context,
        scene: &SceneContext,
        id: Option<ImageId>,
        srgb: bool,
    ) -> Option<wgpu::TextureView> {
        id.and_then(|id| self.texture(ctx, scene, id, srgb))
            .map(|texture| texture.view.clone())
    }

    fn build_material(&mut self, ctx: &Context, scene: &SceneContext, desc: &MaterialDesc) -> Material {
        let device = &ctx.device;
        let fallbacks = &ctx.fallbacks;
        let (uniform, bind_group) = match desc.shading() {
            Shading::Standard(m) => {
                let uniform = uniform_buffer(device, &desc.name, &[StandardUniform::from(m)]);
                let map = self
                    .texture_view(ctx, scene, m.map, true)
                    .unwrap_or_else(|| fallbacks.white.view.clone());
                let normal = self
                    .texture_view(ctx, scene, m.normal_map, false)
                    .unwrap_or_else(|| fallbacks.normal.view.clone());
                let roughness = self
                    .texture_view(ctx, scene, m.roughness_map, false)
                    .unwrap_or_else(|| fallbacks.linear_white.view.clone());
                let ao = self
                    .texture_view(ctx, scene, m.ao_map, false)
                    .unwrap_or_else(|| fallbacks.linear_white.view.clone());
                let sampler = create_sampler(device, m.filter);
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout: &ctx.layouts.standard,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: uniform.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&map),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(&normal),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::TextureView(&roughness),
                        },
                        wgpu::BindGroupEntry {
                            binding: 4,
                            resource: wgpu::BindingResource::TextureView(&ao),
                        },
                        wgpu::BindGroupEntry {
                            binding: 5,
                            resource: wgpu::BindingResource::Sampler(&sampler),
                        },
                    ],
                    label: Some(&desc.name),
                });
                (uniform, bind_group)
            }
            Shading::Glass(m) => {
                let uniform = uniform_buffer(device, &desc.name, &[GlassUniform::from(m)]);
                let bind_group = uniform_bind_group(ctx, &desc.name, &uniform);
                (uniform, bind_group)
            }
            Shading::Procedural(m) => {
                let uniform = uniform_buffer(device, &desc.name, &[ProceduralUniform::new(m, scene.time())]);
                let bind_group = uniform_bind_group(ctx, &desc.name, &uniform);
                (uniform, bind_group)
            }
            Shading::Points(m) => {
                let model = scene.graph[scene.groups.stars].world.to_matrix();
                let uniform = uniform_buffer(device, &desc.name, &[PointsUniform::new(m, model)]);
                let sprite = self
                    .texture_view(ctx, scene, m.sprite, true)
                    .unwrap_or_else(|| fallbacks.white.view.clone());
                let sampler = create_sampler(device, TextureFilter::Linear);
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout: &ctx.layouts.points,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: uniform.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&sprite),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::Sampler(&sampler),
                        },
                    ],
                    label: Some(&desc.name),
                });
                (uniform, bind_group)
            }
        };
        Material {
            name: desc.name.clone(),
            bind_group,
            uniform,
            revision: desc.revision(),
        }
    }

    fn write_procedural_time(&self, ctx: &Context, scene: &SceneContext) {
        for (id, material) in &self.materials {
            if let Some(Shading::Procedural(m)) = scene.assets.material(*id).map(MaterialDesc::shading) {
                let uniform = ProceduralUniform::new(m, scene.time());
                ctx.queue
                    .write_buffer(&material.uniform, 0, bytemuck::cast_slice(&[uniform]));
            }
        }
    }

    fn sync_stars(&mut self, ctx: &Context, scene: &SceneContext) {
        if scene.stars.is_empty() {
            return;
        }
        if self.stars.is_none() {
            self.stars = Some(Points::upload(&ctx.device, "stars", &scene.stars.points));
        }
        let id = scene.materials.stars;
        let Some(desc) = scene.assets.material(id) else {
            return;
        };
        self.ensure_material(ctx, scene, id, desc);
        if let (Some(material), Shading::Points(m)) = (self.materials.get(&id), desc.shading()) {
            let model = scene.graph[scene.groups.stars].world.to_matrix();
            ctx.queue.write_buffer(
                &material.uniform,
                0,
                bytemuck::cast_slice(&[PointsUniform::new(m, model)]),
            );
        }
    }

    fn sync_sky(&mut self, ctx: &Context, scene: &SceneContext) {
        if self.sky.is_some() || self.sky_failed {
            return;
        }
        let Some(faces) = scene.sky_faces() else {
            return;
        };
        let images: Option<Vec<_>> = faces.iter().map(|&id| scene.assets.image(id)).collect();
        let Some(images) = images else {
            return;
        };
        let faces = [images[0], images[1], images[2], images[3], images[4], images[5]];
        let built = Texture::cubemap(&ctx.device, &ctx.queue, faces)
            .and_then(|cubemap| mk_sky_bind_group(&ctx.device, &ctx.layouts.sky, &cubemap));
        match built {
            Ok(bind_group) => {
                log::info!("sky cubemap uploaded");
                self.sky = Some(bind_group);
            }
            Err(e) => {
                log::error!("sky stays at the clear colour: {e:#}");
                self.sky_failed = true;
            }
        }
    }

    pub fn has_sky(&self) -> bool {
        self.sky.is_some()
    }

    /// Number of instanced draws queued for this frame.
    pub fn draw_count(&self) -> usize {
        self.batches.values().filter(|batch| batch.amount > 0).count()
    }

    pub fn render(&self, scene: &SceneContext) -> Render<'_> {
        let mut renders = Vec::with_capacity(self.batches.len() + 2);
        if let Some(sky) = &self.sky {
            renders.push(Render::Sky(sky));
        }
        for (key, batch) in &self.batches {
            if batch.amount == 0 {
                continue;
            }
            let (Some(mesh), Some(material)) = (self.meshes.get(&key.mesh), self.materials.get(&key.material)) else {
                continue;
            };
            let joints = key
                .skin
                .filter(|_| mesh.skin_buffer.is_some())
                .and_then(|skin| self.palettes.get(&skin))
                .map(|palette| &palette.bind_group);
            let instanced = Instanced {
                instance: &batch.buffer,
                mesh,
                material,
                amount: batch.amount,
                casts_shadow: key.casts_shadow,
                joints,
            };
            renders.push(match batch.pass {
                DrawPass::Lit if instanced.joints.is_some() => Render::Skinned(instanced),
                DrawPass::Lit => Render::Lit(instanced),
                DrawPass::Procedural => Render::Procedural(instanced),
                DrawPass::Transparent => Render::Transparent(instanced),
                DrawPass::Overlay => Render::Overlay(instanced),
                // point materials never sit on mesh nodes
                DrawPass::Points => Render::None,
            });
        }
        if let (Some(points), Some(material)) = (&self.stars, self.materials.get(&scene.materials.stars)) {
            renders.push(Render::Points(PointCloud { points, material }));
        }
        Render::Composed(renders)
    }
}

fn uniform_buffer<T: bytemuck::Pod>(device: &wgpu::Device, label: &str, contents: &[T]) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(contents),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

fn uniform_bind_group(ctx: &Context, label: &str, uniform: &wgpu::Buffer) -> wgpu::BindGroup {
    ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: &ctx.layouts.uniform,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform.as_entire_binding(),
        }],
        label: Some(label),
    })
}
