//! Everything the scene loads, and what each asset becomes.

use crate::{
    data_structures::{instance::Instance, material::TextureSlot},
    resources::{AssetKind, LoadTask, LoadableAsset},
};

/// The completion handler of an asset: names the place its resource goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetTarget {
    Quad,
    GrassPatch,
    GrassTexture(TextureSlot),
    WoodenBase,
    GroundTexture(TextureSlot),
    SkyFace(usize),
    StarSprite,
    /// The avatar's model; its first clip is clip 0.
    AvatarRig { avatar: usize },
    AvatarClip { avatar: usize, clip: usize },
    RadioTexture(TextureSlot),
    Radio,
    Bench,
    AmbientSound,
    RadioSound,
}

/// A character with its clips, one file per clip.
#[derive(Clone, Debug, PartialEq)]
pub struct AvatarSpec {
    pub name: &'static str,
    /// The first file carries the rig and clip 0.
    pub clip_files: [&'static str; 3],
    pub clip_labels: [&'static str; 3],
    pub placement: Instance,
    /// Clip started once every clip has loaded.
    pub initial_clip: usize,
}

pub fn avatars() -> Vec<AvatarSpec> {
    vec![
        AvatarSpec {
            name: "Sitting Woman",
            clip_files: [
                "woman/Sitting_Clap.glb",
                "woman/Sitting_Yell.glb",
                "woman/Fist_Pump.glb",
            ],
            clip_labels: ["Clap", "Yell", "Cheer"],
            placement: Instance::placed([-14.6, 0.0, 0.0], 0.8, 0.02),
            initial_clip: 1,
        },
        AvatarSpec {
            name: "Dancing Woman",
            clip_files: [
                "dancingWoman/Shuffling.glb",
                "dancingWoman/Brooklyn_Uprock.glb",
                "dancingWoman/Dancing_Twerk.glb",
            ],
            clip_labels: ["Shuffle", "Brooklyn Uprock", "Twerk"],
            placement: Instance::placed([-11.4, 0.0, 4.5], -2.5, 0.02),
            initial_clip: 1,
        },
    ]
}

pub const SKY_FACES: [&str; 6] = [
    "cubemap/px.png",
    "cubemap/nx.png",
    "cubemap/py.png",
    "cubemap/ny.png",
    "cubemap/pz.png",
    "cubemap/nz.png",
];

const GRASS_TEXTURES: [(&str, TextureSlot); 4] = [
    (
        "whispy-grass-meadow-bl/wispy-grass-meadow_albedo.png",
        TextureSlot::Map,
    ),
    (
        "whispy-grass-meadow-bl/wispy-grass-meadow_normal-ogl.png",
        TextureSlot::Normal,
    ),
    (
        "whispy-grass-meadow-bl/wispy-grass-meadow_roughness.png",
        TextureSlot::Roughness,
    ),
    (
        "whispy-grass-meadow-bl/wispy-grass-meadow_ao.png",
        TextureSlot::AmbientOcclusion,
    ),
];

pub const GROUND_TEXTURES: [(&str, TextureSlot); 4] = [
    (
        "dusty-ground-gravel/dusty-ground-gravel1-albedo.png",
        TextureSlot::Map,
    ),
    (
        "dusty-ground-gravel/dusty-ground-gravel1-Normal-ogl.png",
        TextureSlot::Normal,
    ),
    (
        "dusty-ground-gravel/dusty-ground-gravel1-Roughness.png",
        TextureSlot::Roughness,
    ),
    (
        "dusty-ground-gravel/dusty-ground-gravel1-Ambient_Occlusion.png",
        TextureSlot::AmbientOcclusion,
    ),
];

const RADIO_TEXTURES: [(&str, TextureSlot); 3] = [
    (
        "radio/textures/radiobody_UNFOLD6_1001_BaseColor.png",
        TextureSlot::Map,
    ),
    (
        "radio/textures/radiobody_UNFOLD6_1001_Normal.png",
        TextureSlot::Normal,
    ),
    (
        "radio/textures/radiobody_UNFOLD6_1001_Roughness.png",
        TextureSlot::Roughness,
    ),
];

fn single(url: &str, kind: AssetKind, target: AssetTarget) -> LoadTask<AssetTarget> {
    LoadTask::Single(LoadableAsset::new(url, kind, target))
}

/// The load tasks of the whole scene. Each avatar is one chain so its clips
/// arrive after the rig they bind to.
pub fn load_plan(avatars: &[AvatarSpec]) -> Vec<LoadTask<AssetTarget>> {
    let mut tasks = Vec::new();

    tasks.extend(SKY_FACES.iter().enumerate().map(|(face, url)| {
        single(url, AssetKind::Texture, AssetTarget::SkyFace(face))
    }));
    tasks.push(single("quad_lynn.gltf", AssetKind::Mesh, AssetTarget::Quad));
    tasks.extend(
        GRASS_TEXTURES
            .iter()
            .map(|(url, slot)| single(url, AssetKind::Texture, AssetTarget::GrassTexture(*slot))),
    );
    tasks.push(single("grass.obj", AssetKind::Mesh, AssetTarget::GrassPatch));
    tasks.extend(
        GROUND_TEXTURES
            .iter()
            .map(|(url, slot)| single(url, AssetKind::Texture, AssetTarget::GroundTexture(*slot))),
    );
    tasks.push(single("woodenBase.obj", AssetKind::Mesh, AssetTarget::WoodenBase));

    for (avatar, spec) in avatars.iter().enumerate() {
        let chain = spec
            .clip_files
            .iter()
            .enumerate()
            .map(|(clip, url)| {
                let target = if clip == 0 {
                    AssetTarget::AvatarRig { avatar }
                } else {
                    AssetTarget::AvatarClip { avatar, clip }
                };
                LoadableAsset::new(*url, AssetKind::Mesh, target)
            })
            .collect();
        tasks.push(LoadTask::Chain(chain));
    }

    tasks.push(single("bench.gltf", AssetKind::Mesh, AssetTarget::Bench));
    tasks.extend(
        RADIO_TEXTURES
            .iter()
            .map(|(url, slot)| single(url, AssetKind::Texture, AssetTarget::RadioTexture(*slot))),
    );
    tasks.push(single(
        "radio/realtoneradio_one.glb",
        AssetKind::Mesh,
        AssetTarget::Radio,
    ));
    tasks.push(single("star.png", AssetKind::Texture, AssetTarget::StarSprite));
    tasks.push(single(
        "soft-ambient-background-music.mp3",
        AssetKind::Audio,
        AssetTarget::AmbientSound,
    ));
    tasks.push(single("trendybeatz.mp3", AssetKind::Audio, AssetTarget::RadioSound));
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avatar_chains_start_with_the_rig() {
        let plan = load_plan(&avatars());
        let chains: Vec<_> = plan
            .iter()
            .filter_map(|task| match task {
                LoadTask::Chain(assets) => Some(assets),
                LoadTask::Single(_) => None,
            })
            .collect();
        assert_eq!(chains.len(), 2);
        for (avatar, chain) in chains.iter().enumerate() {
            assert_eq!(chain[0].target, AssetTarget::AvatarRig { avatar });
            assert_eq!(chain[2].target, AssetTarget::AvatarClip { avatar, clip: 2 });
        }
    }

    #[test]
    fn every_url_is_planned_once() {
        let plan = load_plan(&avatars());
        let mut urls: Vec<_> = plan
            .iter()
            .flat_map(|task| task.assets().iter().map(|a| a.url.clone()))
            .collect();
        let total = urls.len();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), total);
        assert_eq!(total, 6 + 1 + 4 + 1 + 4 + 1 + 6 + 1 + 3 + 1 + 1 + 2);
    }
}
