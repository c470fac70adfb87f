//! Places loaded and generated meshes into the scene graph.
//!
//! Every placement is a fixed transform applied once, when the asset arrives.
//! Copies (grass patches, benches) clone the source subtree and then apply
//! their own offset.

use cgmath::Vector3;

use crate::{
    animation::SkinBinding,
    data_structures::{
        geometry,
        instance::Instance,
        material::{
            GlassMaterial, ImageId, MaterialDesc, MaterialId, PointsMaterial, ProceduralMaterial,
            Shading, StandardMaterial, TextureFilter,
        },
        scene_graph::{Capabilities, MeshId, NodeId, SceneGraph, SkinId},
    },
    resources::{mesh::MeshAsset, mesh::MeshData, texture::ImageData},
};

/// Authored transforms of everything in the scene.
pub mod placement {
    use crate::data_structures::instance::Instance;

    pub fn globe() -> Instance {
        Instance::placed([0.0, -9.0, -5.0], 0.0, 1.0)
    }

    pub fn quad_group() -> Instance {
        Instance::placed([-8.0, 5.5, 9.0], 0.0, 0.67)
    }

    pub fn avatar_group() -> Instance {
        Instance::placed([-5.0, 0.0, -15.5], 0.3, 1.0)
    }

    pub fn radio_group() -> Instance {
        Instance::new()
    }

    pub fn quad_model() -> Instance {
        Instance::placed([10.0, 0.0, 0.0], 0.0, 0.9)
    }

    pub fn grass_patch() -> Instance {
        Instance::placed([-6.0, 0.0, -14.0], 0.0, 1.1)
    }

    pub const GRASS_CLONE_OFFSETS: [[f32; 3]; 3] =
        [[0.0, 0.0, 25.0], [25.0, 0.0, 0.0], [25.0, 0.0, 25.0]];

    pub fn wooden_base() -> Instance {
        Instance::new()
            .with_position([0.0, -19.0, -5.0])
            .with_scale([2.5, 2.8, 2.5])
    }

    pub fn glass_sphere() -> Instance {
        Instance::new().with_position([0.0, 35.0, 0.0])
    }

    pub fn electricity() -> Instance {
        Instance::placed([0.0, 29.0, -5.0], 0.0, 62.0)
    }

    pub fn billboard() -> Instance {
        Instance::new().with_position([-9.3, 8.5, -27.3])
    }

    pub fn bench() -> Instance {
        Instance::placed([-15.0, 0.0, 0.5], 1.2, 0.025)
    }

    /// Positions and yaw of the bench copies; each keeps the source's scale.
    pub const BENCH_COPIES: [([f32; 3], f32); 3] = [
        ([-20.0, 0.0, 11.0], 1.6),
        ([8.5, 0.0, -25.0], 0.0),
        ([30.5, 0.0, -25.0], 0.0),
    ];

    pub fn radio_model() -> Instance {
        Instance::placed([-17.5, 5.5, 0.0], 0.0, 0.04)
    }
}

/// Dimensions of the generated meshes.
pub const GROUND: (f32, f32, f32, u32) = (47.0, 42.0, 11.0, 64);
pub const GLASS_RADIUS: f32 = 61.0;
pub const BILLBOARD: (f32, f32) = (5.0, 3.75);

/// The mesh, image, material and skin tables scene nodes point into.
#[derive(Debug, Default)]
pub struct SceneAssets {
    pub meshes: Vec<MeshData>,
    pub images: Vec<ImageData>,
    pub materials: Vec<MaterialDesc>,
    pub skins: Vec<SkinBinding>,
}

impl SceneAssets {
    pub fn add_mesh(&mut self, mesh: MeshData) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    pub fn add_image(&mut self, image: ImageData) -> ImageId {
        self.images.push(image);
        ImageId(self.images.len() - 1)
    }

    pub fn add_material(&mut self, material: MaterialDesc) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    pub fn add_skin(&mut self, skin: SkinBinding) -> SkinId {
        self.skins.push(skin);
        SkinId(self.skins.len() - 1)
    }

    pub fn skin(&self, id: SkinId) -> Option<&SkinBinding> {
        self.skins.get(id.0)
    }

    pub fn material(&self, id: MaterialId) -> Option<&MaterialDesc> {
        self.materials.get(id.0)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut MaterialDesc> {
        self.materials.get_mut(id.0)
    }

    pub fn image(&self, id: ImageId) -> Option<&ImageData> {
        self.images.get(id.0)
    }
}

/// The fixed groups every asset is attached below.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Groups {
    pub globe: NodeId,
    pub quad: NodeId,
    pub avatar: NodeId,
    pub radio: NodeId,
    pub stars: NodeId,
}

impl Groups {
    pub fn build(graph: &mut SceneGraph) -> Self {
        let root = graph.root();
        let globe = graph.add_group(root, "globe", placement::globe());
        let quad = graph.add_group(globe, "quad", placement::quad_group());
        let avatar = graph.add_group(quad, "avatars", placement::avatar_group());
        let radio = graph.add_group(globe, "radio", placement::radio_group());
        let stars = graph.add_group(root, "stars", Instance::new());
        Self {
            globe,
            quad,
            avatar,
            radio,
            stars,
        }
    }
}

/// Materials created up front; textures are filled in as they load.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneMaterials {
    pub ground: MaterialId,
    pub grass: MaterialId,
    pub radio: MaterialId,
    pub wood: MaterialId,
    pub glass: MaterialId,
    pub electricity: MaterialId,
    pub signal: MaterialId,
    pub stars: MaterialId,
    /// Used by model parts that carry no image.
    pub plain: MaterialId,
}

impl SceneMaterials {
    pub fn build(assets: &mut SceneAssets) -> Self {
        let ground = assets.add_material(MaterialDesc::standard(
            "ground",
            StandardMaterial {
                uv_repeat: [16.0, 16.0],
                uv_offset: [4.0, 4.0],
                ao_intensity: 0.05,
                ..Default::default()
            },
        ));
        let grass = assets.add_material(MaterialDesc::standard(
            "grass",
            StandardMaterial {
                ao_intensity: 1.0,
                ..Default::default()
            },
        ));
        let radio = assets.add_material(MaterialDesc::standard(
            "radio",
            StandardMaterial {
                filter: TextureFilter::Nearest,
                ..Default::default()
            },
        ));
        let wood = assets.add_material(MaterialDesc::new(
            "wood",
            Shading::Procedural(ProceduralMaterial::wood()),
        ));
        let glass = assets.add_material(MaterialDesc::new(
            "glass",
            Shading::Glass(GlassMaterial::default()),
        ));
        let electricity = assets.add_material(MaterialDesc::new(
            "electricity",
            Shading::Procedural(ProceduralMaterial::electricity()),
        ));
        let signal = assets.add_material(MaterialDesc::new(
            "lost signal",
            Shading::Procedural(ProceduralMaterial::lost_signal()),
        ));
        let stars = assets.add_material(MaterialDesc::new(
            "stars",
            Shading::Points(PointsMaterial::default()),
        ));
        let plain = assets.add_material(MaterialDesc::standard("plain", StandardMaterial::default()));
        Self {
            ground,
            grass,
            radio,
            wood,
            glass,
            electricity,
            signal,
            stars,
            plain,
        }
    }
}

/// Nodes of the generated meshes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeneratedNodes {
    pub ground: NodeId,
    pub glass: NodeId,
    pub electricity: NodeId,
    pub billboard: NodeId,
}

impl GeneratedNodes {
    pub fn build(
        graph: &mut SceneGraph,
        assets: &mut SceneAssets,
        groups: &Groups,
        materials: &SceneMaterials,
    ) -> Self {
        let (top, bottom, height, segments) = GROUND;
        let ground_mesh = assets.add_mesh(geometry::cylinder(top, bottom, height, segments));
        let ground = graph.add_mesh(
            groups.globe,
            "ground",
            Instance::new(),
            ground_mesh,
            Some(materials.ground),
        );
        graph[ground].capabilities.insert(Capabilities::RECEIVE_SHADOW);

        let glass_mesh = assets.add_mesh(geometry::sphere(GLASS_RADIUS, 64, 32));
        let glass = graph.add_mesh(
            groups.globe,
            "glass",
            placement::glass_sphere(),
            glass_mesh,
            Some(materials.glass),
        );

        let electricity_mesh = assets.add_mesh(geometry::sphere(1.0, 32, 16));
        let electricity = graph.add_mesh(
            graph.root(),
            "electricity",
            placement::electricity(),
            electricity_mesh,
            Some(materials.electricity),
        );

        let (width, height) = BILLBOARD;
        let billboard_mesh = assets.add_mesh(geometry::plane(width, height));
        let billboard = graph.add_mesh(
            groups.quad,
            "billboard",
            placement::billboard(),
            billboard_mesh,
            Some(materials.signal),
        );

        Self {
            ground,
            glass,
            electricity,
            billboard,
        }
    }
}

/// How a loaded model is put into the graph.
#[derive(Clone, Debug)]
pub struct Attachment {
    pub name: String,
    pub parent: NodeId,
    pub placement: Instance,
    /// Replaces the local transform of every model node that draws a mesh.
    pub mesh_local: Option<Instance>,
    /// Material for every part; parts otherwise sample their own image.
    pub material: Option<MaterialId>,
    /// Shadow flags added to every mesh node.
    pub shadows: Capabilities,
}

impl Attachment {
    pub fn new(name: impl Into<String>, parent: NodeId, placement: Instance) -> Self {
        Self {
            name: name.into(),
            parent,
            placement,
            mesh_local: None,
            material: None,
            shadows: Capabilities::NONE,
        }
    }

    pub fn mesh_local(mut self, local: Instance) -> Self {
        self.mesh_local = Some(local);
        self
    }

    pub fn material(mut self, material: MaterialId) -> Self {
        self.material = Some(material);
        self
    }

    pub fn shadows(mut self, shadows: Capabilities) -> Self {
        self.shadows = shadows;
        self
    }
}

/// Copies a decoded model into the graph and returns the node holding it.
pub fn attach(
    graph: &mut SceneGraph,
    assets: &mut SceneAssets,
    plain: MaterialId,
    asset: MeshAsset,
    attachment: &Attachment,
) -> NodeId {
    let holder = graph.add_group(attachment.parent, &attachment.name, attachment.placement);

    let mesh_ids: Vec<MeshId> = asset
        .meshes
        .into_iter()
        .map(|mesh| assets.add_mesh(mesh))
        .collect();
    let image_materials: Vec<MaterialId> = asset
        .images
        .into_iter()
        .map(|image| {
            let name = image.name.clone();
            let image = assets.add_image(image);
            assets.add_material(MaterialDesc::standard(
                name,
                StandardMaterial {
                    map: Some(image),
                    ..Default::default()
                },
            ))
        })
        .collect();

    // nodes are stored parents first
    let mut placed: Vec<NodeId> = Vec::with_capacity(asset.nodes.len());
    for node in &asset.nodes {
        let parent = node
            .parent
            .and_then(|p| placed.get(p).copied())
            .unwrap_or(holder);
        let local = match attachment.mesh_local {
            Some(local) if !node.primitives.is_empty() => local,
            _ => node.local,
        };
        placed.push(graph.add_group(parent, &node.name, local));
    }

    // joints may sit anywhere in the model, so skins resolve once every node exists
    let skin_ids: Vec<Option<SkinId>> = asset
        .skins
        .into_iter()
        .enumerate()
        .map(|(idx, skin)| {
            let joints: Option<Vec<NodeId>> = skin.joints.iter().map(|&j| placed.get(j).copied()).collect();
            match joints {
                Some(joints) if !joints.is_empty() => Some(assets.add_skin(SkinBinding::new(
                    format!("{}#skin{}", attachment.name, idx),
                    joints,
                    skin.inverse_bind,
                ))),
                _ => {
                    log::warn!("{}: skin {} has unresolved joints", attachment.name, idx);
                    None
                }
            }
        })
        .collect();

    for (node, &id) in asset.nodes.iter().zip(&placed) {
        for (part, primitive) in node.primitives.iter().enumerate() {
            let Some(&mesh) = mesh_ids.get(primitive.mesh) else {
                log::warn!("{}: node {} points at a missing mesh", attachment.name, node.name);
                continue;
            };
            let material = attachment
                .material
                .or_else(|| primitive.image.and_then(|i| image_materials.get(i).copied()))
                .unwrap_or(plain);
            let drawn = graph.add_mesh(
                id,
                &format!("{}#{}", node.name, part),
                Instance::new(),
                mesh,
                Some(material),
            );
            graph[drawn].skin = primitive.skin.and_then(|s| skin_ids.get(s).copied().flatten());
        }
    }

    if attachment.shadows != Capabilities::NONE {
        graph.visit_mut(holder, Capabilities::HAS_SHADOW, |node| {
            node.capabilities.insert(attachment.shadows);
        });
    }
    holder
}

/// Clones `source` below `parent` once per offset, shifting each copy.
pub fn clone_with_offsets(
    graph: &mut SceneGraph,
    source: NodeId,
    parent: NodeId,
    offsets: &[[f32; 3]],
) -> Vec<NodeId> {
    offsets
        .iter()
        .map(|offset| {
            let copy = graph.clone_subtree(source, parent);
            graph[copy].local.position += Vector3::from(*offset);
            copy
        })
        .collect()
}

/// Clones the bench below `parent` at each authored spot.
pub fn copy_benches(graph: &mut SceneGraph, bench: NodeId, parent: NodeId) -> Vec<NodeId> {
    placement::BENCH_COPIES
        .iter()
        .map(|(position, yaw)| {
            let copy = graph.clone_subtree(bench, parent);
            let local = graph[copy].local.with_position(*position).with_yaw(*yaw);
            graph[copy].local = local;
            copy
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::mesh::{AssetNode, Primitive, Skin};
    use cgmath::{Matrix4, SquareMatrix};

    fn two_part_model() -> MeshAsset {
        let triangle = geometry::plane(1.0, 1.0);
        MeshAsset {
            name: "model".into(),
            nodes: vec![
                AssetNode {
                    name: "root".into(),
                    local: Instance::new(),
                    parent: None,
                    primitives: Vec::new(),
                },
                AssetNode {
                    name: "part".into(),
                    local: Instance::new().with_position([1.0, 0.0, 0.0]),
                    parent: Some(0),
                    primitives: vec![
                        Primitive {
                            mesh: 0,
                            image: Some(0),
                            skin: None,
                        },
                        Primitive {
                            mesh: 1,
                            ..Default::default()
                        },
                    ],
                },
            ],
            meshes: vec![triangle.clone(), triangle],
            images: vec![ImageData::solid("skin", [255, 0, 0, 255])],
            ..Default::default()
        }
    }

    #[test]
    fn attached_parts_get_image_or_plain_materials() {
        let mut graph = SceneGraph::new();
        let mut assets = SceneAssets::default();
        let plain = assets.add_material(MaterialDesc::standard("plain", StandardMaterial::default()));
        let attachment = Attachment::new("model", graph.root(), Instance::new())
            .shadows(Capabilities::CAST_SHADOW);
        let holder = attach(&mut graph, &mut assets, plain, two_part_model(), &attachment);
        let drawn: Vec<_> = graph
            .subtree(holder)
            .into_iter()
            .filter(|&id| graph[id].mesh.is_some())
            .collect();
        assert_eq!(drawn.len(), 2);
        assert_ne!(graph[drawn[0]].material, Some(plain));
        assert_eq!(graph[drawn[1]].material, Some(plain));
        assert!(graph[drawn[0]].capabilities.contains(Capabilities::CAST_SHADOW));
        assert!(!graph[holder].capabilities.contains(Capabilities::CAST_SHADOW));
        assert_eq!(assets.images.len(), 1);
    }

    #[test]
    fn skinned_parts_point_at_their_joint_nodes() {
        let mut model = two_part_model();
        model.nodes.push(AssetNode {
            name: "Hips".into(),
            local: Instance::new().with_position([0.0, 1.0, 0.0]),
            parent: Some(0),
            primitives: Vec::new(),
        });
        model.nodes[1].primitives[0].skin = Some(0);
        model.skins = vec![
            Skin {
                joints: vec![2],
                inverse_bind: vec![Matrix4::from_translation([0.0, -1.0, 0.0].into())],
            },
            Skin {
                joints: vec![9],
                inverse_bind: vec![Matrix4::identity()],
            },
        ];
        model.nodes[1].primitives[1].skin = Some(1);

        let mut graph = SceneGraph::new();
        let mut assets = SceneAssets::default();
        let plain = assets.add_material(MaterialDesc::standard("plain", StandardMaterial::default()));
        let attachment = Attachment::new("avatar", graph.root(), Instance::new());
        let holder = attach(&mut graph, &mut assets, plain, model, &attachment);

        let hips = graph.find_in_subtree(holder, "Hips").expect("joint is attached");
        let skinned = graph.find_in_subtree(holder, "part#0").expect("part is attached");
        let skin = graph[skinned].skin.expect("the part is skinned");
        assert_eq!(assets.skin(skin).map(|s| s.joints.clone()), Some(vec![hips]));
        assert_eq!(assets.skins.len(), 1);

        // a skin naming a node the model lacks leaves the part rigid
        let rigid = graph.find_in_subtree(holder, "part#1").expect("part is attached");
        assert_eq!(graph[rigid].skin, None);
    }

    #[test]
    fn mesh_local_replaces_part_transforms() {
        let mut graph = SceneGraph::new();
        let mut assets = SceneAssets::default();
        let plain = assets.add_material(MaterialDesc::standard("plain", StandardMaterial::default()));
        let attachment = Attachment::new("grass", graph.root(), Instance::new())
            .mesh_local(placement::grass_patch());
        let holder = attach(&mut graph, &mut assets, plain, two_part_model(), &attachment);
        let part = graph.find_in_subtree(holder, "part").expect("part is attached");
        assert_eq!(graph[part].local, placement::grass_patch());
    }

    #[test]
    fn bench_copies_keep_the_source_scale() {
        let mut graph = SceneGraph::new();
        let bench = graph.add_group(graph.root(), "bench", placement::bench());
        let quad = graph.add_group(graph.root(), "quad", Instance::new());
        let copies = copy_benches(&mut graph, bench, quad);
        assert_eq!(copies.len(), 3);
        assert_eq!(graph[copies[2]].local.position, Vector3::new(30.5, 0.0, -25.0));
        assert_eq!(graph[copies[2]].local.scale, Vector3::new(0.025, 0.025, 0.025));
        assert_eq!(graph[bench].local, placement::bench());
    }

    #[test]
    fn grass_clones_are_offset_from_the_source() {
        let mut graph = SceneGraph::new();
        let grass = graph.add_group(graph.root(), "grass", Instance::new().with_position([1.0, 0.0, 0.0]));
        let root = graph.root();
        let copies = clone_with_offsets(&mut graph, grass, root, &placement::GRASS_CLONE_OFFSETS);
        assert_eq!(graph[copies[0]].local.position, Vector3::new(1.0, 0.0, 25.0));
        assert_eq!(graph[copies[2]].local.position, Vector3::new(26.0, 0.0, 25.0));
    }
}
