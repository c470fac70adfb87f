//! Render composition and pipeline batching.
//!
//! A flow describes what it wants drawn as a tree of [`Render`] values. The
//! engine flattens the tree into [`Batches`], one per pipeline, and draws the
//! batches in a fixed order: sky, lit, skinned, procedural, points,
//! transparent and finally the overlay. Each pipeline is bound once per frame
//! no matter how many draws it serves. Before that, the shadow casters among
//! the opaque batches are drawn into the key light's shadow map.

use wgpu::RenderPass;

use crate::{
    context::Context,
    data_structures::model::{DrawModel, Material, Mesh, Points},
};

/// One mesh drawn `amount` times with the transforms in `instance`.
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub mesh: &'a Mesh,
    pub material: &'a Material,
    pub amount: usize,
    /// Drawn into the shadow map as well.
    pub casts_shadow: bool,
    /// Joint palette of a skinned mesh.
    pub joints: Option<&'a wgpu::BindGroup>,
}

pub struct PointCloud<'a> {
    pub points: &'a Points,
    pub material: &'a Material,
}

/// Specifies how something should be rendered.
///
/// # Variants
///
/// - `None` renders nothing
/// - `Lit`/`Lits` textured surfaces under the scene lights
/// - `Skinned` a lit surface deformed by its joints
/// - `Procedural`/`Procedurals` opaque shader-generated surfaces
/// - `Transparent`/`Transparents` blended surfaces that never write depth
/// - `Overlay` additive surfaces drawn after everything else
/// - `Points` a sprite cloud
/// - `Sky` the cubemap background
/// - `Composed(Vec<Render>)` recursively renders a composition of renders
pub enum Render<'a> {
    None,
    Lit(Instanced<'a>),
    Lits(Vec<Instanced<'a>>),
    Skinned(Instanced<'a>),
    Procedural(Instanced<'a>),
    Procedurals(Vec<Instanced<'a>>),
    Transparent(Instanced<'a>),
    Transparents(Vec<Instanced<'a>>),
    Overlay(Instanced<'a>),
    Points(PointCloud<'a>),
    Sky(&'a wgpu::BindGroup),
    Composed(Vec<Render<'a>>),
}

#[derive(Default)]
pub struct Batches<'a> {
    sky: Option<&'a wgpu::BindGroup>,
    lit: Vec<Instanced<'a>>,
    skinned: Vec<Instanced<'a>>,
    procedural: Vec<Instanced<'a>>,
    points: Vec<PointCloud<'a>>,
    transparent: Vec<Instanced<'a>>,
    overlay: Vec<Instanced<'a>>,
}

impl<'a> Render<'a> {
    pub(crate) fn set_pipelines(self, batches: &mut Batches<'a>) {
        match self {
            Render::Lit(instanced) => batches.lit.push(instanced),
            Render::Lits(mut vec) => batches.lit.append(&mut vec),
            Render::Skinned(instanced) => batches.skinned.push(instanced),
            Render::Procedural(instanced) => batches.procedural.push(instanced),
            Render::Procedurals(mut vec) => batches.procedural.append(&mut vec),
            Render::Transparent(instanced) => batches.transparent.push(instanced),
            Render::Transparents(mut vec) => batches.transparent.append(&mut vec),
            Render::Overlay(instanced) => batches.overlay.push(instanced),
            Render::Points(cloud) => batches.points.push(cloud),
            // the last sky wins
            Render::Sky(group) => batches.sky = Some(group),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(batches)),
            Render::None => (),
        }
    }
}

impl Batches<'_> {
    pub fn is_empty(&self) -> bool {
        self.sky.is_none()
            && self.lit.is_empty()
            && self.skinned.is_empty()
            && self.procedural.is_empty()
            && self.points.is_empty()
            && self.transparent.is_empty()
            && self.overlay.is_empty()
    }

    /// Number of draw calls the batches will issue.
    pub fn draw_calls(&self) -> usize {
        usize::from(self.sky.is_some())
            + self.lit.len()
            + self.skinned.len()
            + self.procedural.len()
            + self.points.len()
            + self.transparent.len()
            + self.overlay.len()
    }

    pub(crate) fn draw(&self, ctx: &Context, render_pass: &mut RenderPass<'_>) {
        let camera = &ctx.camera.bind_group;
        let light = &ctx.light.bind_group;

        if let Some(sky) = self.sky {
            render_pass.set_pipeline(&ctx.pipelines.sky);
            render_pass.set_bind_group(0, sky, &[]);
            render_pass.set_bind_group(1, camera, &[]);
            render_pass.draw(0..3, 0..1);
        }

        let meshes = [
            (&ctx.pipelines.lit, &self.lit),
            (&ctx.pipelines.procedural, &self.procedural),
        ];
        for (pipeline, batch) in meshes {
            draw_instanced(render_pass, pipeline, batch, camera, light);
        }

        if !self.skinned.is_empty() {
            render_pass.set_pipeline(&ctx.pipelines.skinned);
            for instanced in &self.skinned {
                let Some((skin, joints)) = skin_of(instanced) else {
                    continue;
                };
                render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
                render_pass.set_vertex_buffer(2, skin.slice(..));
                render_pass.set_bind_group(3, joints, &[]);
                render_pass.draw_mesh_instanced(
                    instanced.mesh,
                    instanced.material,
                    0..instanced.amount as u32,
                    camera,
                    light,
                );
            }
        }

        if !self.points.is_empty() {
            render_pass.set_pipeline(&ctx.pipelines.points);
            for cloud in &self.points {
                render_pass.draw_points(cloud.points, cloud.material, camera);
            }
        }

        draw_instanced(render_pass, &ctx.pipelines.glass, &self.transparent, camera, light);
        draw_instanced(render_pass, &ctx.pipelines.overlay, &self.overlay, camera, light);
    }
}

impl Batches<'_> {
    /// Opaque draws that also go into the shadow map.
    pub fn shadow_casters(&self) -> usize {
        self.lit
            .iter()
            .chain(&self.procedural)
            .chain(&self.skinned)
            .filter(|instanced| instanced.casts_shadow)
            .count()
    }

    /// Renders the shadow casters' depth from the key light.
    pub(crate) fn draw_shadows(&self, ctx: &Context, render_pass: &mut RenderPass<'_>) {
        let shadow = &ctx.light.shadow.bind_group;

        let mut casters = self
            .lit
            .iter()
            .chain(&self.procedural)
            .filter(|instanced| instanced.casts_shadow && instanced.amount > 0)
            .peekable();
        if casters.peek().is_some() {
            render_pass.set_pipeline(&ctx.pipelines.shadow);
            render_pass.set_bind_group(0, shadow, &[]);
            for instanced in casters {
                render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
                render_pass.draw_mesh_depth(instanced.mesh, 0..instanced.amount as u32);
            }
        }

        let mut skinned = self
            .skinned
            .iter()
            .filter(|instanced| instanced.casts_shadow)
            .filter_map(|instanced| skin_of(instanced).map(|skin| (instanced, skin)))
            .peekable();
        if skinned.peek().is_some() {
            render_pass.set_pipeline(&ctx.pipelines.skinned_shadow);
            render_pass.set_bind_group(0, shadow, &[]);
            for (instanced, (skin, joints)) in skinned {
                render_pass.set_bind_group(1, joints, &[]);
                render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
                render_pass.set_vertex_buffer(2, skin.slice(..));
                render_pass.draw_mesh_depth(instanced.mesh, 0..instanced.amount as u32);
            }
        }
    }
}

/// The skin weights and joint palette of a skinned draw.
fn skin_of<'a>(instanced: &Instanced<'a>) -> Option<(&'a wgpu::Buffer, &'a wgpu::BindGroup)> {
    if instanced.amount == 0 {
        return None;
    }
    let mesh: &'a Mesh = instanced.mesh;
    match (&mesh.skin_buffer, instanced.joints) {
        (Some(skin), Some(joints)) => Some((skin, joints)),
        _ => {
            log::warn!("{} has no joints to skin with", mesh.name);
            None
        }
    }
}

fn draw_instanced(
    render_pass: &mut RenderPass<'_>,
    pipeline: &wgpu::RenderPipeline,
    batch: &[Instanced<'_>],
    camera: &wgpu::BindGroup,
    light: &wgpu::BindGroup,
) {
    if batch.is_empty() {
        return;
    }
    render_pass.set_pipeline(pipeline);
    for instanced in batch {
        if instanced.amount == 0 || instanced.instance.size() == 0 {
            log::warn!("skipping {} with zero instances", instanced.mesh.name);
            continue;
        }
        render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
        render_pass.draw_mesh_instanced(
            instanced.mesh,
            instanced.material,
            0..instanced.amount as u32,
            camera,
            light,
        );
    }
}
