use std::io::Cursor;

use snow_globe::{
    audio::{AudioCommand, AudioOutput},
    cgmath::{Matrix4, SquareMatrix},
    data_structures::{
        instance::Instance,
        model::{ModelVertex, SkinVertex},
    },
    resources::{
        AudioBuffer, Completion, Loaded,
        animation::{AnimationClip, Keyframes, Track},
        mesh::{AssetNode, MeshAsset, MeshData, Primitive, Skin},
        texture::ImageData,
    },
    scene::plan::{AssetTarget, AvatarSpec},
};

/// Records every audio command it is handed.
#[derive(Default)]
pub struct Recorder(pub Vec<AudioCommand>);

impl AudioOutput for Recorder {
    fn submit(&mut self, command: AudioCommand) {
        self.0.push(command);
    }
}

impl Recorder {
    pub fn gains(&self) -> Vec<f32> {
        self.0
            .iter()
            .filter_map(|command| match command {
                AudioCommand::SetGain { gain, .. } => Some(*gain),
                _ => None,
            })
            .collect()
    }
}

/// One avatar whose clips are keyed on a single "Hips" bone.
pub fn test_avatar() -> AvatarSpec {
    AvatarSpec {
        name: "Tester",
        clip_files: ["tester/a.glb", "tester/b.glb", "tester/c.glb"],
        clip_labels: ["A", "B", "C"],
        placement: Instance::new(),
        initial_clip: 1,
    }
}

/// A clip moving "Hips" from the origin to `x` along the x axis.
pub fn clip(x: f32) -> AnimationClip {
    AnimationClip::new(
        "clip",
        vec![Track {
            target: "Hips".to_string(),
            timestamps: vec![0.0, 2.0],
            keyframes: Keyframes::Translation(vec![
                cgmath::Vector3::new(0.0, 0.0, 0.0),
                cgmath::Vector3::new(x, 0.0, 0.0),
            ]),
        }],
    )
}

/// A rig with a single "Hips" node and no geometry.
pub fn rig(first_clip: AnimationClip) -> MeshAsset {
    MeshAsset {
        name: "rig".to_string(),
        nodes: vec![AssetNode {
            name: "Hips".to_string(),
            local: Instance::new(),
            parent: None,
            primitives: Vec::new(),
        }],
        clips: vec![first_clip],
        ..Default::default()
    }
}

fn triangle(name: &str) -> MeshData {
    let corner = |x: f32, y: f32| ModelVertex {
        position: [x, y, 0.0],
        normal: [0.0, 0.0, 1.0],
        ..Default::default()
    };
    MeshData::new(name, vec![corner(0.0, 0.0), corner(1.0, 0.0), corner(0.0, 1.0)], vec![0, 1, 2])
}

/// A model with one "body" node drawing a triangle.
pub fn model(name: &str) -> MeshAsset {
    MeshAsset {
        name: name.to_string(),
        nodes: vec![AssetNode {
            name: "body".to_string(),
            local: Instance::new(),
            parent: None,
            primitives: vec![Primitive {
                mesh: 0,
                ..Default::default()
            }],
        }],
        meshes: vec![triangle(name)],
        ..Default::default()
    }
}

/// [`rig`] plus a "Body" triangle fully weighted to "Hips".
pub fn skinned_rig(first_clip: AnimationClip) -> MeshAsset {
    let mut asset = rig(first_clip);
    asset.nodes.push(AssetNode {
        name: "Body".to_string(),
        local: Instance::new(),
        parent: None,
        primitives: vec![Primitive {
            mesh: 0,
            skin: Some(0),
            ..Default::default()
        }],
    });
    let weights = vec![SkinVertex::new([0; 4], [1.0, 0.0, 0.0, 0.0]); 3];
    asset.meshes = vec![triangle("body").with_skin(weights)];
    asset.skins = vec![Skin {
        joints: vec![0],
        inverse_bind: vec![Matrix4::identity()],
    }];
    asset
}

pub fn clip_asset(clip: AnimationClip) -> MeshAsset {
    MeshAsset {
        name: "clip".to_string(),
        clips: vec![clip],
        ..Default::default()
    }
}

pub fn ok(url: &str, target: AssetTarget, loaded: Loaded) -> Completion<AssetTarget> {
    Completion {
        url: url.to_string(),
        target,
        result: Ok(loaded),
    }
}

pub fn failed(url: &str, target: AssetTarget) -> Completion<AssetTarget> {
    Completion {
        url: url.to_string(),
        target,
        result: Err(anyhow::anyhow!("{url} not found")),
    }
}

pub fn texture(url: &str) -> Loaded {
    Loaded::Texture(ImageData::solid(url, [200, 180, 160, 255]))
}

pub fn audio(url: &str) -> Loaded {
    Loaded::Audio(AudioBuffer {
        name: url.to_string(),
        bytes: vec![0u8; 16].into(),
    })
}

/// A 2x2 PNG file.
pub fn png_bytes() -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("png encoding");
    bytes.into_inner()
}
