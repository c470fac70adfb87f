//! glTF 2.0 decoding (`.gltf` with external or embedded buffers and `.glb`).

use std::collections::HashMap;

use anyhow::Context as _;
use cgmath::SquareMatrix;

use crate::{
    data_structures::{instance::Instance, model},
    resources::{
        AssetSource,
        animation::{AnimationClip, Keyframes, Track},
        mesh::{AssetNode, MeshAsset, MeshData, Primitive, Skin},
        texture::ImageData,
    },
};

/// Decodes a glTF file. Buffers and images referenced by relative uri are
/// fetched through `source`, relative to `url`.
pub async fn decode(source: &AssetSource, url: &str, bytes: &[u8]) -> anyhow::Result<MeshAsset> {
    let gltf = gltf::Gltf::from_slice(bytes).with_context(|| format!("invalid glTF {url}"))?;

    // Load buffers
    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .with_context(|| format!("{url} references a missing binary chunk"))?,
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                gltf::buffer::Data::from_source(buffer.source(), None)?.0
            }
            gltf::buffer::Source::Uri(uri) => source.fetch(&join_url(url, uri)).await?,
        };
        if data.len() < buffer.length() {
            anyhow::bail!(
                "buffer {} of {url} has {} bytes, expected {}",
                buffer.index(),
                data.len(),
                buffer.length()
            );
        }
        buffer_data.push(data);
    }

    // Load images, remembering where each document image ended up
    let mut images = Vec::new();
    let mut image_slots: HashMap<usize, usize> = HashMap::new();
    for image in gltf.images() {
        let decoded = match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let start = view.offset();
                let end = start + view.length();
                let bytes = buffer_data[view.buffer().index()]
                    .get(start..end)
                    .context("image view out of bounds")?;
                ImageData::decode(bytes, url, mime_type.split('/').next_back())
            }
            gltf::image::Source::Uri { uri, .. } if uri.starts_with("data:") => {
                log::warn!("{url}: inline image {} skipped", image.index());
                continue;
            }
            gltf::image::Source::Uri { uri, mime_type } => {
                let image_url = join_url(url, uri);
                let hint = mime_type
                    .and_then(|mt| mt.split('/').next_back())
                    .map(str::to_string)
                    .or_else(|| crate::resources::texture::extension(&image_url));
                let bytes = source.fetch(&image_url).await?;
                ImageData::decode(&bytes, &image_url, hint.as_deref())
            }
        };
        match decoded {
            Ok(decoded) => {
                image_slots.insert(image.index(), images.len());
                images.push(decoded);
            }
            // A broken texture leaves the mesh untextured rather than failing it.
            Err(e) => log::warn!("{url}: {e:#}"),
        }
    }

    let mut asset = MeshAsset {
        name: url.to_string(),
        images,
        clips: read_clips(&gltf, &buffer_data),
        ..Default::default()
    };

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .with_context(|| format!("{url} contains no scene"))?;
    let mut node_slots: HashMap<usize, usize> = HashMap::new();
    for node in scene.nodes() {
        read_node(&mut asset, node, None, &buffer_data, &image_slots, &mut node_slots);
    }
    asset.skins = read_skins(&gltf, &buffer_data, &node_slots);
    // primitives whose skin could not be resolved are drawn rigid
    for node in &mut asset.nodes {
        for primitive in &mut node.primitives {
            let resolved = primitive
                .skin
                .and_then(|skin| asset.skins.get(skin))
                .is_some_and(|skin| !skin.joints.is_empty());
            if !resolved {
                primitive.skin = None;
            }
        }
    }
    Ok(asset)
}

fn read_node(
    asset: &mut MeshAsset,
    node: gltf::Node,
    parent: Option<usize>,
    buffers: &[Vec<u8>],
    image_slots: &HashMap<usize, usize>,
    node_slots: &mut HashMap<usize, usize>,
) {
    let (position, rotation, scale) = node.transform().decomposed();
    let local = Instance {
        position: position.into(),
        rotation: rotation.into(),
        scale: scale.into(),
    };
    let idx = asset.nodes.len();
    node_slots.insert(node.index(), idx);
    asset.nodes.push(AssetNode {
        name: node_name(&node),
        local,
        parent,
        primitives: Vec::new(),
    });

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let mesh_name = mesh.name().unwrap_or("unknown_mesh");
            let Some(data) = read_primitive(mesh_name, &primitive, buffers) else {
                log::warn!("primitive {} of mesh {mesh_name} has no positions", primitive.index());
                continue;
            };
            let image = primitive
                .material()
                .pbr_metallic_roughness()
                .base_color_texture()
                .and_then(|info| image_slots.get(&info.texture().source().index()))
                .copied();
            let skin = node.skin().map(|skin| skin.index()).filter(|_| data.is_skinned());
            asset.nodes[idx].primitives.push(Primitive {
                mesh: asset.meshes.len(),
                image,
                skin,
            });
            asset.meshes.push(data);
        }
    }

    for child in node.children() {
        read_node(asset, child, Some(idx), buffers, image_slots, node_slots);
    }
}

/// Reads every skin of the document, in document order. A skin naming a node
/// outside the scene comes back without joints.
fn read_skins(gltf: &gltf::Gltf, buffers: &[Vec<u8>], node_slots: &HashMap<usize, usize>) -> Vec<Skin> {
    gltf.skins()
        .map(|skin| {
            let joints: Option<Vec<usize>> = skin
                .joints()
                .map(|joint| node_slots.get(&joint.index()).copied())
                .collect();
            let Some(joints) = joints else {
                log::warn!("skin {} uses joints outside the scene", skin.index());
                return Skin {
                    joints: Vec::new(),
                    inverse_bind: Vec::new(),
                };
            };
            let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let mut inverse_bind: Vec<cgmath::Matrix4<f32>> = match reader.read_inverse_bind_matrices() {
                Some(matrices) => matrices.map(cgmath::Matrix4::from).collect(),
                None => Vec::new(),
            };
            // missing matrices default to identity
            inverse_bind.resize(joints.len(), cgmath::Matrix4::identity());
            Skin { joints, inverse_bind }
        })
        .collect()
}

fn read_primitive(name: &str, primitive: &gltf::Primitive, buffers: &[Vec<u8>]) -> Option<MeshData> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let mut vertices: Vec<model::ModelVertex> = reader
        .read_positions()?
        .map(|position| model::ModelVertex {
            position,
            ..Default::default()
        })
        .collect();
    if let Some(normals) = reader.read_normals() {
        vertices
            .iter_mut()
            .zip(normals)
            .for_each(|(vertex, normal)| vertex.normal = normal);
    }
    if let Some(tex_coords) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
        vertices
            .iter_mut()
            .zip(tex_coords)
            .for_each(|(vertex, uv)| vertex.tex_coords = uv);
    }

    let indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };

    let skin = match (reader.read_joints(0), reader.read_weights(0)) {
        (Some(joints), Some(weights)) => joints
            .into_u16()
            .zip(weights.into_f32())
            .map(|(joints, weights)| model::SkinVertex::new(joints, weights))
            .collect(),
        _ => Vec::new(),
    };

    let mut data = MeshData::new(name, vertices, indices).with_skin(skin);
    match reader.read_tangents() {
        Some(tangents) => {
            for (vertex, tangent) in data.vertices.iter_mut().zip(tangents) {
                // glTF stores the bitangent sign in w
                let tangent: cgmath::Vector4<f32> = tangent.into();
                let normal: cgmath::Vector3<f32> = vertex.normal.into();
                vertex.tangent = tangent.truncate().into();
                vertex.bitangent = (normal.cross(tangent.truncate()) * tangent.w).into();
            }
        }
        None => data.compute_tangents(),
    }
    data.is_valid().then_some(data)
}

fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node{}", node.index()))
}

/// Reads every animation of the document into a clip whose tracks target
/// nodes by name.
pub fn read_clips(gltf: &gltf::Gltf, buffers: &[Vec<u8>]) -> Vec<AnimationClip> {
    gltf.animations()
        .map(|animation| {
            let tracks = animation
                .channels()
                .filter_map(|channel| {
                    let reader =
                        channel.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
                    let timestamps: Vec<f32> = reader.read_inputs()?.collect();
                    let keyframes = match reader.read_outputs()? {
                        gltf::animation::util::ReadOutputs::Translations(translation) => {
                            Keyframes::Translation(translation.map(Into::into).collect())
                        }
                        gltf::animation::util::ReadOutputs::Rotations(rotation) => {
                            Keyframes::Rotation(
                                rotation
                                    .into_f32()
                                    // glTF quaternions are [x, y, z, w]
                                    .map(|[x, y, z, w]| cgmath::Quaternion::new(w, x, y, z))
                                    .collect(),
                            )
                        }
                        gltf::animation::util::ReadOutputs::Scales(scales) => {
                            Keyframes::Scale(scales.map(Into::into).collect())
                        }
                        gltf::animation::util::ReadOutputs::MorphTargetWeights(_) => {
                            Keyframes::Other
                        }
                    };
                    if keyframes.is_empty() {
                        return None;
                    }
                    Some(Track {
                        target: node_name(&channel.target().node()),
                        timestamps,
                        keyframes,
                    })
                })
                .collect();
            let name = animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("animation{}", animation.index()));
            AnimationClip::new(name, tracks)
        })
        .collect()
}

/// Resolves `relative` against the directory of `base`.
pub fn join_url(base: &str, relative: &str) -> String {
    match base.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{relative}"),
        None => relative.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_uris_resolve_next_to_the_file() {
        assert_eq!(join_url("woman/Sitting_Clap.gltf", "scene.bin"), "woman/scene.bin");
        assert_eq!(join_url("bench.gltf", "bench.bin"), "bench.bin");
    }

    /// A single triangle with an embedded buffer and a one-key rotation clip.
    const TRIANGLE: &str = r#"{
        "asset": {"version": "2.0"},
        "scene": 0,
        "scenes": [{"nodes": [0]}],
        "nodes": [{"name": "Root", "children": [1], "translation": [1, 2, 3]},
                  {"name": "Hips", "mesh": 0}],
        "meshes": [{"name": "tri", "primitives": [{"attributes": {"POSITION": 0}}]}],
        "animations": [{"name": "Wave", "channels": [{"sampler": 0, "target": {"node": 1, "path": "rotation"}}],
                        "samplers": [{"input": 1, "output": 2}]}],
        "buffers": [{"byteLength": 56, "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAAAAAAAAAAAAgD8="}],
        "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 36},
                        {"buffer": 0, "byteOffset": 36, "byteLength": 4},
                        {"buffer": 0, "byteOffset": 40, "byteLength": 16}],
        "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                       "min": [0, 0, 0], "max": [1, 1, 0]},
                      {"bufferView": 1, "componentType": 5126, "count": 1, "type": "SCALAR",
                       "min": [0], "max": [0]},
                      {"bufferView": 2, "componentType": 5126, "count": 1, "type": "VEC4"}]
    }"#;

    #[test]
    fn decodes_hierarchy_meshes_and_clips() {
        let source = AssetSource::memory(Vec::<(String, Vec<u8>)>::new());
        let asset = futures::executor::block_on(decode(&source, "tri.gltf", TRIANGLE.as_bytes()))
            .expect("decode");
        assert_eq!(asset.nodes.len(), 2);
        assert_eq!(asset.nodes[0].name, "Root");
        assert_eq!(asset.nodes[1].parent, Some(0));
        assert_eq!(asset.nodes[0].local.position, cgmath::Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(asset.meshes.len(), 1);
        assert_eq!(asset.meshes[0].indices, vec![0, 1, 2]);
        assert_eq!(asset.clips.len(), 1);
        assert_eq!(asset.clips[0].name, "Wave");
        assert_eq!(asset.clips[0].tracks[0].target, "Hips");
    }

    /// A triangle skinned to a single "Hips" joint one unit above the origin.
    const SKINNED: &str = r#"{
        "asset": {"version": "2.0"},
        "scene": 0,
        "scenes": [{"nodes": [0]}],
        "nodes": [{"name": "Armature", "children": [1, 2]},
                  {"name": "Body", "mesh": 0, "skin": 0},
                  {"name": "Hips", "translation": [0, 1, 0]}],
        "meshes": [{"name": "body", "primitives": [{"attributes": {"POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2}}]}],
        "skins": [{"joints": [2], "inverseBindMatrices": 3}],
        "buffers": [{"byteLength": 172, "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAgL8AAAAAAACAPw=="}],
        "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 36},
                        {"buffer": 0, "byteOffset": 36, "byteLength": 24},
                        {"buffer": 0, "byteOffset": 60, "byteLength": 48},
                        {"buffer": 0, "byteOffset": 108, "byteLength": 64}],
        "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                       "min": [0, 0, 0], "max": [1, 1, 0]},
                      {"bufferView": 1, "componentType": 5123, "count": 3, "type": "VEC4"},
                      {"bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4"},
                      {"bufferView": 3, "componentType": 5126, "count": 1, "type": "MAT4"}]
    }"#;

    #[test]
    fn decodes_skins_against_scene_nodes() {
        let source = AssetSource::memory(Vec::<(String, Vec<u8>)>::new());
        let asset = futures::executor::block_on(decode(&source, "body.gltf", SKINNED.as_bytes()))
            .expect("decode");
        assert_eq!(asset.nodes[2].name, "Hips");
        assert_eq!(asset.skins.len(), 1);
        assert_eq!(asset.skins[0].joints, vec![2]);
        let inverse_bind = asset.skins[0].inverse_bind[0];
        assert_eq!(inverse_bind.w, cgmath::Vector4::new(0.0, -1.0, 0.0, 1.0));

        assert_eq!(asset.nodes[1].primitives[0].skin, Some(0));
        let mesh = &asset.meshes[0];
        assert!(mesh.is_skinned());
        assert_eq!(mesh.skin.len(), 3);
        assert_eq!(mesh.skin[0].weights, [1.0, 0.0, 0.0, 0.0]);
    }
}
