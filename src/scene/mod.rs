//! The snow globe scene: everything that is not drawing.
//!
//! [`SceneContext`] owns the graph, the asset tables, the avatars, the audio rig
//! and the panel state. It is created once, fed load completions and panel
//! actions as they arrive, and ticked once per frame. Nothing here touches the
//! GPU, so the whole scene can be driven headless.

use std::collections::HashMap;

use cgmath::{Quaternion, Rad, Rotation3, Vector3};

use crate::{
    animation::AnimationBlender,
    audio::{AudioOutput, AudioRig, AudioSource, Positional, SourceId},
    config::SceneConfig,
    data_structures::{
        instance::Instance,
        material::{ImageId, MaterialId, TextureSlot},
        scene_graph::{Capabilities, NodeId, SceneGraph},
    },
    error::SceneError,
    panel::{AvatarControls, ControlPanel, PanelAction},
    resources::{
        Completion, LoadTask, Loaded,
        animation::AnimationClip,
        loading::{LoadEvent, LoadingManager},
        mesh::MeshAsset,
    },
};

pub mod assembler;
pub mod globe;
pub mod gpu;
pub mod plan;
pub mod stars;

use assembler::{Attachment, GeneratedNodes, Groups, SceneAssets, SceneMaterials, placement};
use plan::{AssetTarget, AvatarSpec};
use stars::StarField;

/// A placed avatar and the nodes its clips drive.
#[derive(Debug)]
pub struct AvatarRig {
    pub spec: AvatarSpec,
    pub node: Option<NodeId>,
    bones: HashMap<String, NodeId>,
    bind: HashMap<NodeId, Instance>,
}

impl AvatarRig {
    fn new(spec: AvatarSpec) -> Self {
        Self {
            spec,
            node: None,
            bones: HashMap::new(),
            bind: HashMap::new(),
        }
    }

    /// Records the bind pose of every node of the placed model by name.
    fn bind_to(&mut self, graph: &SceneGraph, node: NodeId) {
        self.node = Some(node);
        for id in graph.subtree(node) {
            self.bones.entry(graph[id].name.clone()).or_insert(id);
            self.bind.insert(id, graph[id].local);
        }
    }

    pub fn bone(&self, name: &str) -> Option<NodeId> {
        self.bones.get(name).copied()
    }
}

pub struct SceneContext {
    pub config: SceneConfig,
    pub graph: SceneGraph,
    pub assets: SceneAssets,
    pub groups: Groups,
    pub materials: SceneMaterials,
    pub generated: GeneratedNodes,
    pub stars: StarField,
    pub loading: LoadingManager,
    pub avatars: Vec<AvatarRig>,
    pub blenders: Vec<AnimationBlender>,
    pub audio: AudioRig,
    pub panel: ControlPanel,
    ambient: SourceId,
    radio_sound: SourceId,
    radio: Option<NodeId>,
    sky: [Option<ImageId>; 6],
    plan: Vec<LoadTask<AssetTarget>>,
    rotating: bool,
    immersive: bool,
    pan: f32,
    time: f32,
    globe_yaw: f32,
    star_yaw: f32,
}

impl SceneContext {
    pub fn new(config: SceneConfig) -> Self {
        Self::with_avatars(config, plan::avatars())
    }

    pub fn with_avatars(config: SceneConfig, avatar_specs: Vec<AvatarSpec>) -> Self {
        let mut graph = SceneGraph::new();
        let mut assets = SceneAssets::default();
        let groups = Groups::build(&mut graph);
        let materials = SceneMaterials::build(&mut assets);
        let generated = GeneratedNodes::build(&mut graph, &mut assets, &groups, &materials);
        let stars = StarField::generate(config.star_count, config.star_radius, config.star_seed);

        let mut audio = AudioRig::new();
        let ambient = audio.add(AudioSource::ambient("ambient", config.ambient_volume));
        let radio_sound = audio.add(AudioSource::positional(
            "radio",
            config.positional_volume,
            Positional::new(config.ref_distance, config.rolloff),
        ));

        let controls: Vec<_> = avatar_specs
            .iter()
            .map(|spec| AvatarControls {
                name: spec.name.to_string(),
                clip_labels: spec.clip_labels.iter().map(|l| l.to_string()).collect(),
            })
            .collect();
        let panel = ControlPanel::new(&controls, config.pan_range, config.pan_step);
        log::info!("control panel:\n{}", panel.describe());

        let blenders = avatar_specs
            .iter()
            .enumerate()
            .map(|(idx, spec)| {
                AnimationBlender::new(idx, spec.name, spec.clip_files.len(), config.fade_seconds())
            })
            .collect();
        let plan = plan::load_plan(&avatar_specs);
        let avatars = avatar_specs.into_iter().map(AvatarRig::new).collect();

        let mut scene = Self {
            config,
            graph,
            assets,
            groups,
            materials,
            generated,
            stars,
            loading: LoadingManager::new(),
            avatars,
            blenders,
            audio,
            panel,
            ambient,
            radio_sound,
            radio: None,
            sky: [None; 6],
            plan,
            rotating: true,
            immersive: false,
            pan: 0.0,
            time: 0.0,
            globe_yaw: 0.0,
            star_yaw: 0.0,
        };
        scene.graph.update_world_transforms();
        scene
    }

    /// Registers every planned asset with the loading manager and hands out
    /// the tasks to run.
    pub fn start_loading(&mut self) -> Vec<LoadTask<AssetTarget>> {
        for task in &self.plan {
            for asset in task.assets() {
                if let Some(LoadEvent::Started) = self.loading.item_start(&asset.url) {
                    log::info!("loading started");
                }
            }
        }
        log::info!("{} assets queued", self.loading.total());
        self.plan.clone()
    }

    pub fn plan(&self) -> &[LoadTask<AssetTarget>] {
        &self.plan
    }

    /// Hands a finished load to its target and reports progress.
    pub fn complete(&mut self, completion: Completion<AssetTarget>) -> Vec<LoadEvent> {
        let Completion {
            url,
            target,
            result,
        } = completion;
        let ok = match result.map_err(|e| SceneError::asset_load(&url, format!("{e:#}"))) {
            Ok(loaded) => match self.place(&url, target, loaded) {
                Ok(()) => true,
                Err(e) => {
                    log::error!("{e}");
                    false
                }
            },
            Err(e) => {
                log::error!("{e}");
                false
            }
        };

        let events = self.loading.item_end(&url, ok);
        for event in &events {
            match event {
                LoadEvent::Progress {
                    url,
                    loaded,
                    total,
                    percent,
                } => log::debug!("{url} done ({loaded}/{total}, {percent}%)"),
                LoadEvent::Finished => log::info!(
                    "loading finished, {} of {} failed",
                    self.loading.failed(),
                    self.loading.total()
                ),
                LoadEvent::Started => {}
            }
        }
        events
    }

    fn place(&mut self, url: &str, target: AssetTarget, loaded: Loaded) -> Result<(), SceneError> {
        let kind = loaded.kind();
        match (target, loaded) {
            (AssetTarget::Quad, Loaded::Mesh(asset)) => {
                let attachment = Attachment::new("quad model", self.groups.quad, placement::quad_model())
                    .shadows(Capabilities::CAST_SHADOW | Capabilities::RECEIVE_SHADOW);
                self.attach(asset, &attachment);
            }
            (AssetTarget::GrassPatch, Loaded::Mesh(asset)) => {
                let attachment = Attachment::new("grass", self.groups.quad, Instance::new())
                    .mesh_local(placement::grass_patch())
                    .material(self.materials.grass)
                    .shadows(Capabilities::RECEIVE_SHADOW);
                let grass = self.attach(asset, &attachment);
                assembler::clone_with_offsets(
                    &mut self.graph,
                    grass,
                    self.groups.quad,
                    &placement::GRASS_CLONE_OFFSETS,
                );
            }
            (AssetTarget::WoodenBase, Loaded::Mesh(asset)) => {
                let attachment = Attachment::new("wooden base", self.graph.root(), Instance::new())
                    .mesh_local(placement::wooden_base())
                    .material(self.materials.wood);
                self.attach(asset, &attachment);
            }
            (AssetTarget::Bench, Loaded::Mesh(asset)) => {
                let attachment = Attachment::new("bench", self.groups.avatar, placement::bench())
                    .shadows(Capabilities::CAST_SHADOW | Capabilities::RECEIVE_SHADOW);
                let bench = self.attach(asset, &attachment);
                assembler::copy_benches(&mut self.graph, bench, self.groups.quad);
            }
            (AssetTarget::Radio, Loaded::Mesh(asset)) => {
                let attachment = Attachment::new("radio model", self.groups.radio, placement::radio_model())
                    .material(self.materials.radio)
                    .shadows(Capabilities::CAST_SHADOW | Capabilities::RECEIVE_SHADOW);
                self.radio = Some(self.attach(asset, &attachment));
            }
            (AssetTarget::AvatarRig { avatar }, Loaded::Mesh(mut asset)) => {
                let clips = std::mem::take(&mut asset.clips);
                let rig = self
                    .avatars
                    .get(avatar)
                    .ok_or(SceneError::UnknownAvatar(avatar))?;
                let attachment = Attachment::new(rig.spec.name, self.groups.avatar, rig.spec.placement)
                    .shadows(Capabilities::CAST_SHADOW | Capabilities::RECEIVE_SHADOW);
                let node = self.attach(asset, &attachment);
                if let Some(rig) = self.avatars.get_mut(avatar) {
                    rig.bind_to(&self.graph, node);
                }
                let clip = first_clip(url, clips)?;
                self.add_clip(avatar, 0, clip)?;
            }
            (AssetTarget::AvatarClip { avatar, clip }, Loaded::Mesh(asset)) => {
                let loaded = first_clip(url, asset.into_clips())?;
                self.add_clip(avatar, clip, loaded)?;
            }
            (AssetTarget::GrassTexture(slot), Loaded::Texture(image)) => {
                let image = self.assets.add_image(image);
                self.set_texture(self.materials.grass, slot, image);
            }
            (AssetTarget::GroundTexture(slot), Loaded::Texture(image)) => {
                let image = self.assets.add_image(image);
                self.set_texture(self.materials.ground, slot, image);
            }
            (AssetTarget::RadioTexture(slot), Loaded::Texture(image)) => {
                let image = self.assets.add_image(image);
                self.set_texture(self.materials.radio, slot, image);
            }
            (AssetTarget::StarSprite, Loaded::Texture(image)) => {
                let image = self.assets.add_image(image);
                self.set_texture(self.materials.stars, TextureSlot::Sprite, image);
            }
            (AssetTarget::SkyFace(face), Loaded::Texture(image)) => {
                let image = self.assets.add_image(image);
                let slot = self
                    .sky
                    .get_mut(face)
                    .ok_or_else(|| SceneError::asset_load(url, format!("no cube face {face}")))?;
                *slot = Some(image);
                if self.sky_faces().is_some() {
                    log::info!("skybox complete");
                }
            }
            (AssetTarget::AmbientSound, Loaded::Audio(buffer)) => {
                self.audio.set_buffer(self.ambient, buffer, true);
            }
            (AssetTarget::RadioSound, Loaded::Audio(buffer)) => {
                self.audio.set_buffer(self.radio_sound, buffer, false);
            }
            (target, _) => {
                return Err(SceneError::asset_load(
                    url,
                    format!("{target:?} cannot use a {kind:?} asset"),
                ));
            }
        }
        Ok(())
    }

    fn attach(&mut self, asset: MeshAsset, attachment: &Attachment) -> NodeId {
        let node = assembler::attach(
            &mut self.graph,
            &mut self.assets,
            self.materials.plain,
            asset,
            attachment,
        );
        log::debug!("attached {}", attachment.name);
        node
    }

    fn set_texture(&mut self, material: MaterialId, slot: TextureSlot, image: ImageId) {
        if let Some(desc) = self.assets.material_mut(material) {
            if !desc.set_texture(slot, image) {
                log::warn!("{} has no {:?} slot", desc.name, slot);
            }
        }
    }

    fn add_clip(&mut self, avatar: usize, slot: usize, mut clip: AnimationClip) -> Result<(), SceneError> {
        let rig = self
            .avatars
            .get(avatar)
            .ok_or(SceneError::UnknownAvatar(avatar))?;
        if let Some(label) = rig.spec.clip_labels.get(slot) {
            clip.name = label.to_string();
        }
        let initial = rig.spec.initial_clip;
        let blender = self
            .blenders
            .get_mut(avatar)
            .ok_or(SceneError::UnknownAvatar(avatar))?;
        if blender.add_clip(slot, clip)? {
            blender.start(initial)?;
            log::info!("{} plays clip {}", blender.name(), initial);
        }
        Ok(())
    }

    /// Applies a panel action. Rejected requests are logged and change nothing.
    pub fn handle(&mut self, action: PanelAction) {
        if let Err(e) = self.apply(action) {
            log::warn!("{action:?} ignored: {e}");
        }
    }

    pub fn apply(&mut self, action: PanelAction) -> Result<(), SceneError> {
        match action {
            PanelAction::SetClip { avatar, clip } => {
                self.blenders
                    .get_mut(avatar)
                    .ok_or(SceneError::UnknownAvatar(avatar))?
                    .set_action(clip)?;
            }
            PanelAction::ToggleRotation => {
                self.rotating = !self.rotating;
                log::info!("rotation {}", if self.rotating { "on" } else { "off" });
            }
            PanelAction::MuteAll => {
                let gain = self.audio.toggle_mute();
                log::info!("master gain {gain}");
            }
            PanelAction::ToggleAmbient => {
                self.audio.toggle(self.ambient)?;
            }
            PanelAction::ToggleRadio => {
                self.audio.toggle(self.radio_sound)?;
            }
            PanelAction::Pan(x) => self.set_pan(x)?,
            PanelAction::NudgePan(delta) => self.set_pan(self.pan + delta)?,
            PanelAction::ToggleImmersive => self.set_immersive(!self.immersive),
        }
        Ok(())
    }

    fn set_pan(&mut self, x: f32) -> Result<(), SceneError> {
        self.pan = self.config.clamp_pan(x).ok_or(SceneError::InvalidPan(x))?;
        self.graph[self.groups.radio].local.position.x = self.pan;
        Ok(())
    }

    pub fn set_immersive(&mut self, immersive: bool) {
        if self.immersive != immersive {
            log::info!("{} immersive mode", if immersive { "entering" } else { "leaving" });
        }
        self.immersive = immersive;
        self.panel.set_immersive(immersive);
    }

    /// One frame of scene time.
    pub fn tick(&mut self, dt: f32) {
        for (rig, blender) in self.avatars.iter().zip(self.blenders.iter_mut()) {
            blender.advance(dt);
            for channel in blender.pose() {
                let Some(node) = rig.bone(&channel.target) else {
                    continue;
                };
                if let Some(bind) = rig.bind.get(&node) {
                    self.graph[node].local = channel.apply(bind);
                }
            }
        }

        self.time += dt;
        let step = self.rotation_speed() * dt;
        if !self.immersive {
            self.globe_yaw += step;
        }
        self.star_yaw -= step;
        self.graph[self.groups.globe].local.rotation = Quaternion::from_angle_y(Rad(self.globe_yaw));
        self.graph[self.groups.stars].local.rotation = Quaternion::from_angle_y(Rad(self.star_yaw));
        self.graph.update_world_transforms();

        let radio = self.radio.unwrap_or(self.groups.radio);
        let position = self.graph[radio].world.position;
        self.audio.set_source_position(self.radio_sound, position);
    }

    pub fn set_listener(&mut self, position: Vector3<f32>) {
        self.audio.set_listener(position);
    }

    pub fn drain_audio(&mut self, output: &mut dyn AudioOutput) {
        self.audio.drain(output);
    }

    pub fn teardown(&mut self) {
        self.audio.stop_all();
        log::info!(
            "scene torn down after {:.1}s, {} nodes",
            self.time,
            self.graph.len()
        );
    }

    pub fn rotation_speed(&self) -> f32 {
        if self.rotating {
            self.config.rotation_speed
        } else {
            0.0
        }
    }

    pub fn is_immersive(&self) -> bool {
        self.immersive
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn globe_yaw(&self) -> f32 {
        self.globe_yaw
    }

    pub fn star_yaw(&self) -> f32 {
        self.star_yaw
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn ambient_source(&self) -> SourceId {
        self.ambient
    }

    pub fn radio_source(&self) -> SourceId {
        self.radio_sound
    }

    /// All six cube faces, once every one of them has loaded.
    pub fn sky_faces(&self) -> Option<[ImageId; 6]> {
        let mut faces = [ImageId(0); 6];
        for (face, loaded) in faces.iter_mut().zip(self.sky) {
            *face = loaded?;
        }
        Some(faces)
    }
}

fn first_clip(url: &str, clips: Vec<AnimationClip>) -> Result<AnimationClip, SceneError> {
    clips
        .into_iter()
        .next()
        .ok_or_else(|| SceneError::asset_load(url, "file has no animation"))
}
